use super::prompt::compose;
use super::request::DiagnosticRequest;
use super::response::{DiagnosticResponse, normalize};
use crate::config::Config;
use crate::error::{AppError, ErrorBody};
use crate::gateway::envelope::{LambdaEnvelope, ResponseEnvelope};
use crate::logging;
use crate::openai::OpenAiClient;
use crate::storage::{self, ObjectStore};
use crate::util::id;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// 诊断流水线：校验 → （可选）上传 → 组装对话 → 调用模型 → 归一化。
///
/// 每次调用相互独立，不保存跨请求状态。
pub struct DiagnosticHandler {
    cfg: Arc<Config>,
    store: Arc<dyn ObjectStore>,
    model: OpenAiClient,
}

impl DiagnosticHandler {
    pub fn new(cfg: Arc<Config>, store: Arc<dyn ObjectStore>) -> Result<Self, anyhow::Error> {
        let model = OpenAiClient::new(&cfg)?;
        Ok(Self { cfg, store, model })
    }

    /// 可预期错误渲染为 400 信封；其余错误原样返回给宿主运行时。
    pub async fn handle(&self, envelope: &LambdaEnvelope) -> Result<ResponseEnvelope, anyhow::Error> {
        let span = tracing::info_span!("diagnose", request_id = %id::request_id());
        self.handle_inner(envelope).instrument(span).await
    }

    async fn handle_inner(
        &self,
        envelope: &LambdaEnvelope,
    ) -> Result<ResponseEnvelope, anyhow::Error> {
        let start = Instant::now();
        let log_level = self.cfg.log_level();
        if log_level.client_enabled() {
            let body = envelope.body.as_deref().unwrap_or_default().as_bytes();
            if log_level.raw_enabled() {
                logging::envelope_request_raw(body, envelope.is_base64_encoded);
            } else {
                logging::envelope_request(body, envelope.is_base64_encoded);
            }
        }

        let out = match self.diagnose(envelope).await {
            Ok(resp) => {
                tracing::info!("诊断完成");
                ResponseEnvelope::json(200, &resp)?
            }
            Err(AppError::Fatal(e)) => {
                tracing::error!(error = %format!("{e:#}"), "诊断请求失败（未预期错误）");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "诊断请求失败");
                ResponseEnvelope::json(
                    400,
                    &ErrorBody {
                        error: e.to_string(),
                    },
                )?
            }
        };

        if log_level.client_enabled() {
            logging::envelope_response(out.status_code, start.elapsed(), out.body.as_bytes());
        }
        Ok(out)
    }

    async fn diagnose(&self, envelope: &LambdaEnvelope) -> Result<DiagnosticResponse, AppError> {
        let request =
            DiagnosticRequest::from_envelope(envelope.body.as_deref(), envelope.is_base64_encoded)?;

        let stored = match &request.media {
            Some(media) => {
                let bucket = self.cfg.s3_bucket.as_deref().ok_or_else(|| {
                    AppError::config_missing("S3_BUCKET environment variable is not set")
                })?;
                let stored = storage::upload_media(
                    self.store.as_ref(),
                    bucket,
                    self.cfg.media_url_ttl,
                    &media.payload,
                    &media.filename,
                    chrono::Utc::now().timestamp(),
                )
                .await?;
                Some(stored)
            }
            None => None,
        };

        let conversation = compose(&request, stored.as_ref());
        let raw = self.model.invoke(&conversation).await?;
        Ok(normalize(&raw))
    }
}

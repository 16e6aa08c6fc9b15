use super::extract::{chat_completion_text, responses_text};
use super::types::{ChatCompletion, ChatRequest, ResponsesRequest, ResponsesResponse};
use crate::config::{ApiMode, Config};
use crate::diagnosis::prompt::Conversation;
use crate::error::AppError;
use crate::logging;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("OpenAI API 错误 {status}: {message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] sonic_rs::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 端点本身不存在（而不是请求出错）：可以换用另一条调用路径。
    pub fn is_capability_missing(&self) -> bool {
        matches!(self.status(), Some(404 | 405 | 501))
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    mode: ApiMode,
    max_output_tokens: u32,
    log_level: logging::LogLevel,
}

impl OpenAiClient {
    pub fn new(cfg: &Config) -> Result<Self, anyhow::Error> {
        let mut builder = reqwest::Client::builder();
        if cfg.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(cfg.timeout_ms));
        }
        if !cfg.proxy.trim().is_empty() {
            builder = builder.proxy(reqwest::Proxy::all(cfg.proxy.trim())?);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: cfg.openai_base_url.clone(),
            api_key: cfg.openai_api_key.clone(),
            model: cfg.openai_model.clone(),
            mode: cfg.api_mode,
            max_output_tokens: cfg.max_output_tokens,
            log_level: cfg.log_level(),
        })
    }

    /// 发送对话并返回模型的纯文本输出（已 trim，保证非空）。
    ///
    /// 单次尽力调用，不重试。传输层/HTTP 错误不属于可预期错误，以 `Fatal` 返回。
    pub async fn invoke(&self, conv: &Conversation) -> Result<String, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::config_missing("OPENAI_API_KEY environment variable is not set")
        })?;

        let text = match self.mode {
            ApiMode::Responses => self.create_response(api_key, conv).await,
            ApiMode::Chat => self.create_chat_completion(api_key, conv).await,
            ApiMode::Auto => match self.create_response(api_key, conv).await {
                Err(e) if e.is_capability_missing() => {
                    tracing::info!(
                        status = ?e.status(),
                        "Responses API 不可用，回退到 Chat Completions"
                    );
                    self.create_chat_completion(api_key, conv).await
                }
                other => other,
            },
        }
        .map_err(|e| AppError::Fatal(e.into()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::empty_model_output(
                "OpenAI returned an empty response",
            ));
        }
        Ok(text.to_string())
    }

    async fn create_response(
        &self,
        api_key: &str,
        conv: &Conversation,
    ) -> Result<String, ApiError> {
        let req = ResponsesRequest::new(&self.model, conv, self.max_output_tokens);
        let bytes = self.post_json("/responses", api_key, &req).await?;
        let resp = sonic_rs::from_slice::<ResponsesResponse>(&bytes)?;
        Ok(responses_text(&resp))
    }

    async fn create_chat_completion(
        &self,
        api_key: &str,
        conv: &Conversation,
    ) -> Result<String, ApiError> {
        let req = ChatRequest::new(&self.model, conv, self.max_output_tokens);
        let bytes = self.post_json("/chat/completions", api_key, &req).await?;
        let resp = sonic_rs::from_slice::<ChatCompletion>(&bytes)?;
        Ok(chat_completion_text(&resp))
    }

    fn build_headers(&self, api_key: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .unwrap_or(HeaderValue::from_static("")),
        );
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        api_key: &str,
        payload: &T,
    ) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let body = sonic_rs::to_vec(payload)?;
        let headers = self.build_headers(api_key);
        if self.log_level.backend_enabled() {
            if self.log_level.raw_enabled() {
                logging::backend_request_raw("POST", &url, &headers, &body);
            } else {
                logging::backend_request("POST", &url, &headers, &body);
            }
        }

        let start = Instant::now();
        let resp = self.http.post(&url).headers(headers).body(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if self.log_level.backend_enabled() {
            if self.log_level.raw_enabled() {
                logging::backend_response_raw(status.as_u16(), start.elapsed(), &bytes);
            } else {
                logging::backend_response(status.as_u16(), start.elapsed(), &bytes);
            }
        }
        tracing::debug!(
            %url,
            status = status.as_u16(),
            elapsed_ms = logging::format_duration_ms(start.elapsed()),
            "模型调用完成"
        );

        if !status.is_success() {
            return Err(extract_error_details(status.as_u16(), &bytes));
        }
        Ok(bytes.to_vec())
    }
}

fn extract_error_details(status: u16, body: &[u8]) -> ApiError {
    #[derive(Debug, serde::Deserialize)]
    struct ErrResp {
        error: ErrInner,
    }

    #[derive(Debug, serde::Deserialize)]
    struct ErrInner {
        #[serde(default)]
        message: String,
    }

    let message = sonic_rs::from_slice::<ErrResp>(body)
        .ok()
        .map(|r| r.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                "Unknown error".to_string()
            } else {
                text.chars().take(500).collect()
            }
        });

    ApiError::Http { status, message }
}

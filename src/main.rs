pub mod config;
pub mod diagnosis;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod openai;
pub mod storage;
pub mod util;

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let in_lambda = gateway::lambda::is_lambda_runtime();
    // 先初始化日志，配置解析中的告警才能输出。
    init_tracing(in_lambda);

    let cfg = Arc::new(config::Config::load());

    let store: Arc<dyn storage::ObjectStore> = Arc::new(storage::s3::S3Store::from_env().await);
    let handler = Arc::new(
        diagnosis::DiagnosticHandler::new(cfg.clone(), store).context("初始化诊断处理器失败")?,
    );

    if cfg.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY 未配置，模型调用将返回配置错误");
    }
    if cfg.s3_bucket.is_none() {
        tracing::warn!("S3_BUCKET 未配置，带媒体的请求将返回配置错误");
    }

    if in_lambda {
        tracing::info!(model = %cfg.openai_model, "以 Lambda 模式启动");
        return gateway::lambda::run(handler)
            .await
            .map_err(|e| anyhow::anyhow!(e));
    }

    gateway::local::serve(&cfg, handler).await
}

fn init_tracing(json: bool) {
    // 依赖库日志默认压到 warn，本项目自身至少 info；
    // 详细的信封/模型请求转储由 DEBUG 单独控制。
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let env = env.trim();
    let filter = if env.is_empty() {
        EnvFilter::new("warn,mechanic_ai=info")
    } else if env.contains("mechanic_ai") {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(format!("{env},mechanic_ai=info"))
    };

    // CloudWatch 按行收集，Lambda 下输出 JSON 且关闭 ANSI 颜色。
    if json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_current_span(true)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .try_init();
    }
}

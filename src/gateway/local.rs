//! 本地开发服务器：把 HTTP 请求包装成网关信封，复用同一个处理器。

use super::envelope::LambdaEnvelope;
use crate::config::Config;
use crate::diagnosis::DiagnosticHandler;
use crate::error::AppError;
use anyhow::Context;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;

pub fn router(handler: Arc<DiagnosticHandler>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/diagnose", post(handle_diagnose))
        .route("/diagnose/", post(handle_diagnose))
        .with_state(handler)
}

pub async fn serve(cfg: &Config, handler: Arc<DiagnosticHandler>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], cfg.port)));

    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("绑定监听端口失败")?;

    axum::serve(listener, router(handler))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务异常退出")?;

    Ok(())
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_diagnose(
    State(handler): State<Arc<DiagnosticHandler>>,
    body: Bytes,
) -> Response {
    let envelope = LambdaEnvelope::from_http_body(&body);
    match handler.handle(&envelope).await {
        Ok(out) => out.into_response(),
        Err(e) => AppError::Fatal(e).into_response(),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("收到退出信号，准备关闭服务...");
}

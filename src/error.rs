use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 诊断流程中的错误。
///
/// 前四类是可预期的失败，统一渲染为 400 错误信封；`Fatal` 之外的未知异常
/// 不在此枚举内，直接交给宿主运行时处理。
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    ConfigurationMissing(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    EmptyModelOutput(String),

    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::ConfigurationMissing(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn empty_model_output(message: impl Into<String>) -> Self {
        Self::EmptyModelOutput(message.into())
    }

    /// 是否以错误信封（400）返回给调用方。
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::Storage(_) => "storage",
            Self::EmptyModelOutput(_) => "empty_model_output",
            Self::Fatal(_) => "fatal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.is_user_facing() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fatal_errors_escape_the_envelope() {
        assert!(AppError::invalid_input("x").is_user_facing());
        assert!(AppError::config_missing("x").is_user_facing());
        assert!(AppError::storage("x").is_user_facing());
        assert!(AppError::empty_model_output("x").is_user_facing());
        assert!(!AppError::from(anyhow::anyhow!("boom")).is_user_facing());
    }

    #[test]
    fn display_is_the_bare_message() {
        let err = AppError::invalid_input("Description is required");
        assert_eq!(err.to_string(), "Description is required");
        assert_eq!(err.kind(), "invalid_input");
    }
}

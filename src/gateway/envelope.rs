use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API Gateway 代理事件中我们关心的部分；其余字段忽略。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LambdaEnvelope {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "isBase64Encoded", default)]
    pub is_base64_encoded: bool,
}

impl LambdaEnvelope {
    /// 原始 HTTP 请求体转信封：非 UTF-8 内容按网关惯例 base64 编码。
    pub fn from_http_body(body: &[u8]) -> Self {
        match std::str::from_utf8(body) {
            Ok(text) => Self {
                body: Some(text.to_string()),
                is_base64_encoded: false,
            },
            Err(_) => Self {
                body: Some(general_purpose::STANDARD.encode(body)),
                is_base64_encoded: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn json<T: Serialize>(status_code: u16, payload: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(payload)?;
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Ok(Self {
            status_code,
            headers,
            body,
        })
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = (status, self.body).into_response();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                resp.headers_mut().insert(name, value);
            }
        }
        resp
    }
}

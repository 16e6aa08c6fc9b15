use crate::error::AppError;
use base64::{Engine as _, engine::general_purpose};
use serde_json::Value;

/// 成对出现的媒体附件：只有 payload 与 filename 同时提供时才成立。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub payload: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRequest {
    pub description: String,
    pub media: Option<MediaAttachment>,
}

impl DiagnosticRequest {
    /// 从网关信封解析并校验请求；无副作用。
    pub fn from_envelope(body: Option<&str>, is_base64_encoded: bool) -> Result<Self, AppError> {
        let body = decode_body(body.unwrap_or("{}"), is_base64_encoded)?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|_| AppError::invalid_input("Request body is not valid JSON"))?;
        let Some(payload) = payload.as_object() else {
            return Err(AppError::invalid_input("Request body must be a JSON object"));
        };

        let description = payload
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if description.is_empty() {
            return Err(AppError::invalid_input("Description is required"));
        }

        let media = optional_text(payload.get("media"));
        let filename = optional_text(payload.get("filename"));
        let media = match (media, filename) {
            (Some(payload), Some(filename)) => Some(MediaAttachment { payload, filename }),
            (None, None) => None,
            _ => {
                return Err(AppError::invalid_input(
                    "media and filename must be supplied together",
                ));
            }
        };

        Ok(Self {
            description: description.to_string(),
            media,
        })
    }
}

fn decode_body(body: &str, is_base64_encoded: bool) -> Result<String, AppError> {
    if !is_base64_encoded {
        return Ok(body.to_string());
    }
    let bytes = general_purpose::STANDARD
        .decode(body.trim())
        .map_err(|_| AppError::invalid_input("Request body is not valid JSON"))?;
    String::from_utf8(bytes).map_err(|_| AppError::invalid_input("Request body is not valid JSON"))
}

/// null、空串与非字符串都视为未提供。
fn optional_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<DiagnosticRequest, AppError> {
        DiagnosticRequest::from_envelope(Some(body), false)
    }

    #[test]
    fn description_is_trimmed() {
        let req = parse(r#"{"description":"  grinding noise when braking \n"}"#).unwrap();
        assert_eq!(req.description, "grinding noise when braking");
        assert!(req.media.is_none());
    }

    #[test]
    fn base64_body_is_decoded_first() {
        let body = general_purpose::STANDARD.encode(r#"{"description":"check engine light"}"#);
        let req = DiagnosticRequest::from_envelope(Some(&body), true).unwrap();
        assert_eq!(req.description, "check engine light");
    }

    #[test]
    fn missing_or_blank_description_is_rejected() {
        for body in [
            r#"{}"#,
            r#"{"description":""}"#,
            r#"{"description":"   \t"}"#,
            r#"{"description":42}"#,
        ] {
            let err = parse(body).unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "{body}");
            assert!(err.to_string().contains("Description is required"), "{body}");
        }
    }

    #[test]
    fn missing_body_means_missing_description() {
        let err = DiagnosticRequest::from_envelope(None, false).unwrap_err();
        assert_eq!(err.to_string(), "Description is required");
    }

    #[test]
    fn non_json_body_is_rejected() {
        for (body, encoded) in [
            ("not json at all", false),
            ("{\"description\":", false),
            ("@@not-base64@@", true),
        ] {
            let err = DiagnosticRequest::from_envelope(Some(body), encoded).unwrap_err();
            assert_eq!(err.to_string(), "Request body is not valid JSON");
        }
    }

    #[test]
    fn non_object_json_is_rejected() {
        let err = parse(r#"["description"]"#).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn media_pair_is_kept_verbatim() {
        let req = parse(
            r#"{"description":"leak","media":"aGVsbG8=","filename":"under/car.jpg"}"#,
        )
        .unwrap();
        assert_eq!(
            req.media,
            Some(MediaAttachment {
                payload: "aGVsbG8=".to_string(),
                filename: "under/car.jpg".to_string(),
            })
        );
    }

    #[test]
    fn null_or_empty_media_counts_as_absent() {
        let req = parse(r#"{"description":"leak","media":null,"filename":""}"#).unwrap();
        assert!(req.media.is_none());
    }

    #[test]
    fn half_a_media_pair_is_rejected() {
        for body in [
            r#"{"description":"leak","media":"aGVsbG8="}"#,
            r#"{"description":"leak","filename":"car.jpg"}"#,
        ] {
            let err = parse(body).unwrap_err();
            assert!(err.to_string().contains("supplied together"), "{body}");
        }
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticResponse {
    pub summary: String,
    pub potential_causes: Vec<String>,
    pub safety_checks: Vec<String>,
    pub recommended_actions: Vec<String>,
}

impl DiagnosticResponse {
    pub fn summary_only(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            potential_causes: Vec::new(),
            safety_checks: Vec::new(),
            recommended_actions: Vec::new(),
        }
    }
}

/// 模型输出是 JSON 对象时按字段取值，否则整体作为 summary。
pub fn normalize(raw: &str) -> DiagnosticResponse {
    let parsed = parse_structured(raw);
    tracing::info!(structured = parsed.is_some(), "模型输出已归一化");
    parsed.unwrap_or_else(|| DiagnosticResponse::summary_only(raw))
}

/// 仅当模型输出整体是 JSON 对象时返回结构化结果。
pub fn parse_structured(raw: &str) -> Option<DiagnosticResponse> {
    let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(raw) else {
        return None;
    };

    Some(DiagnosticResponse {
        summary: parsed
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or(raw)
            .to_string(),
        potential_causes: string_list(&parsed, "potential_causes"),
        safety_checks: string_list(&parsed, "safety_checks"),
        recommended_actions: string_list(&parsed, "recommended_actions"),
    })
}

fn string_list(obj: &Map<String, Value>, field: &str) -> Vec<String> {
    let Some(items) = obj.get(field).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

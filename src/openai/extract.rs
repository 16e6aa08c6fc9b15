use super::types::{ChatCompletion, ResponsesResponse};
use sonic_rs::prelude::*;

/// 从 chat content 字段中提取纯文本：
/// - string：直接返回
/// - array：只拼接 {"type":"text","text":...}
pub fn extract_text_from_content(content: &sonic_rs::Value) -> String {
    if let Some(s) = content.as_str() {
        return s.to_string();
    }
    let Some(arr) = content.as_array() else {
        return String::new();
    };

    let mut out = String::new();
    for it in arr {
        let Some(obj) = it.as_object() else {
            continue;
        };
        if obj.get(&"type").and_then(|v| v.as_str()) != Some("text") {
            continue;
        }
        out.push_str(obj.get(&"text").and_then(|v| v.as_str()).unwrap_or(""));
    }
    out
}

pub fn chat_completion_text(resp: &ChatCompletion) -> String {
    resp.choices
        .first()
        .map(|c| extract_text_from_content(&c.message.content))
        .unwrap_or_default()
}

/// 优先使用 output_text；否则拼接 message 项中的 output_text 片段。
pub fn responses_text(resp: &ResponsesResponse) -> String {
    if let Some(text) = resp.output_text.as_deref()
        && !text.is_empty()
    {
        return text.to_string();
    }

    resp.output
        .iter()
        .filter(|item| item.typ == "message")
        .flat_map(|item| item.content.iter())
        .filter(|c| c.typ == "output_text")
        .map(|c| c.text.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_content_is_returned_as_is() {
        let v = sonic_rs::Value::from("Likely a worn serpentine belt.");
        assert_eq!(extract_text_from_content(&v), "Likely a worn serpentine belt.");
    }

    #[test]
    fn only_text_parts_are_concatenated() {
        let v: sonic_rs::Value = sonic_rs::from_str(
            r#"[
                {"type":"text","text":"Part one. "},
                {"type":"image_url","image_url":{"url":"https://x"}},
                {"type":"refusal","refusal":"no"},
                {"type":"text","text":"Part two."}
            ]"#,
        )
        .unwrap();
        assert_eq!(extract_text_from_content(&v), "Part one. Part two.");
    }

    #[test]
    fn null_content_is_empty() {
        assert_eq!(extract_text_from_content(&sonic_rs::Value::default()), "");
    }

    #[test]
    fn chat_without_choices_is_empty() {
        assert_eq!(chat_completion_text(&ChatCompletion::default()), "");
    }

    #[test]
    fn responses_prefers_output_text() {
        let resp: ResponsesResponse = sonic_rs::from_str(
            r#"{"output_text":"direct","output":[{"type":"message","content":[{"type":"output_text","text":"nested"}]}]}"#,
        )
        .unwrap();
        assert_eq!(responses_text(&resp), "direct");
    }

    #[test]
    fn responses_collects_message_output() {
        let resp: ResponsesResponse = sonic_rs::from_str(
            r#"{
                "output": [
                    {"type":"reasoning","content":[]},
                    {"type":"message","content":[
                        {"type":"output_text","text":"Check the "},
                        {"type":"output_text","text":"battery terminals."}
                    ]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(responses_text(&resp), "Check the battery terminals.");
    }

    #[test]
    fn null_fields_on_output_items_are_tolerated() {
        let resp: ResponsesResponse = sonic_rs::from_str(
            r#"{
                "output_text": null,
                "output": [
                    {"type":"reasoning","content":null},
                    {"type":"message","content":[
                        {"type":"output_text","text":null},
                        {"type":"output_text","text":"Replace the fuel filter."}
                    ]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(responses_text(&resp), "Replace the fuel filter.");

        let resp: ResponsesResponse = sonic_rs::from_str(r#"{"output":null}"#).unwrap();
        assert_eq!(responses_text(&resp), "");
    }
}

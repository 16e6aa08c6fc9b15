use crate::diagnosis::prompt::{ContentPart, Conversation, Message, Role};
use serde::{Deserialize, Deserializer, Serialize};

// ---- Responses API ----

#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest<'a> {
    pub model: &'a str,
    pub input: Vec<InputMessage<'a>>,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputMessage<'a> {
    pub role: &'static str,
    pub content: Vec<InputContent<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent<'a> {
    InputText { text: &'a str },
    InputImage { image_url: &'a str },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesResponse {
    /// SDK 便捷字段；部分兼容服务会直接返回。
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub typ: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub typ: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

// 兼容服务会在 reasoning 等输出项上显式给出 null。
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl<'a> ResponsesRequest<'a> {
    pub fn new(model: &'a str, conv: &'a Conversation, max_output_tokens: u32) -> Self {
        let input = conv
            .messages
            .iter()
            .map(|m| InputMessage {
                role: m.role.as_str(),
                content: m
                    .parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text(text) => InputContent::InputText { text },
                        ContentPart::ImageUrl(url) => InputContent::InputImage { image_url: url },
                    })
                    .collect(),
            })
            .collect();
        Self {
            model,
            input,
            max_output_tokens,
        }
    }
}

// ---- Chat Completions ----

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: ChatContent<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChatContent<'a> {
    Text(&'a str),
    Parts(Vec<ChatPart<'a>>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl<'a> {
    pub url: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: sonic_rs::Value,
}

impl<'a> ChatRequest<'a> {
    pub fn new(model: &'a str, conv: &'a Conversation, max_tokens: u32) -> Self {
        Self {
            model,
            messages: conv.messages.iter().map(chat_message).collect(),
            max_tokens,
        }
    }
}

fn chat_message(m: &Message) -> ChatMessage<'_> {
    // system 保持纯字符串，兼容只接受字符串 system 的服务。
    if let (Role::System, [ContentPart::Text(text)]) = (m.role, m.parts.as_slice()) {
        return ChatMessage {
            role: m.role.as_str(),
            content: ChatContent::Text(text),
        };
    }

    let parts = m
        .parts
        .iter()
        .map(|p| match p {
            ContentPart::Text(text) => ChatPart::Text { text },
            ContentPart::ImageUrl(url) => ChatPart::ImageUrl {
                image_url: ImageUrl { url },
            },
        })
        .collect();
    ChatMessage {
        role: m.role.as_str(),
        content: ChatContent::Parts(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::prompt::compose;
    use crate::diagnosis::request::DiagnosticRequest;
    use crate::storage::StoredMedia;

    fn conversation() -> Conversation {
        let req = DiagnosticRequest {
            description: "squeaky belt".to_string(),
            media: None,
        };
        let media = StoredMedia {
            bucket: "b".to_string(),
            key: "uploads/1-belt.jpg".to_string(),
            retrieval_url: "https://example.test/belt.jpg".to_string(),
        };
        compose(&req, Some(&media))
    }

    #[test]
    fn responses_request_wire_shape() {
        let conv = conversation();
        let req = ResponsesRequest::new("gpt-4o-mini", &conv, 800);
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["model"], "gpt-4o-mini");
        assert_eq!(v["max_output_tokens"], 800);
        assert_eq!(v["input"][0]["role"], "system");
        assert_eq!(v["input"][0]["content"][0]["type"], "input_text");
        assert_eq!(v["input"][1]["content"][0]["text"], "User description: squeaky belt");
        assert_eq!(v["input"][1]["content"][1]["type"], "input_image");
        assert_eq!(
            v["input"][1]["content"][1]["image_url"],
            "https://example.test/belt.jpg"
        );
    }

    #[test]
    fn chat_request_wire_shape() {
        let conv = conversation();
        let req = ChatRequest::new("gpt-4o-mini", &conv, 800);
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["max_tokens"], 800);
        assert!(v["messages"][0]["content"].is_string());
        assert_eq!(v["messages"][1]["role"], "user");
        assert_eq!(v["messages"][1]["content"][0]["type"], "text");
        assert_eq!(v["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            v["messages"][1]["content"][1]["image_url"]["url"],
            "https://example.test/belt.jpg"
        );
    }
}

use super::request::DiagnosticRequest;
use crate::storage::StoredMedia;

pub const SYSTEM_INSTRUCTION: &str = "You are an experienced automotive mechanic. Analyse the user's \
description and the provided media to produce a concise diagnostic report.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    ImageUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

/// 与具体 API 无关的对话结构；各调用路径自行映射成线上格式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

pub fn compose(request: &DiagnosticRequest, media: Option<&StoredMedia>) -> Conversation {
    let mut user_parts = vec![ContentPart::Text(format!(
        "User description: {}",
        request.description
    ))];
    if let Some(media) = media {
        user_parts.push(ContentPart::ImageUrl(media.retrieval_url.clone()));
    }

    Conversation {
        messages: vec![
            Message {
                role: Role::System,
                parts: vec![ContentPart::Text(SYSTEM_INSTRUCTION.to_string())],
            },
            Message {
                role: Role::User,
                parts: user_parts,
            },
        ],
    }
}

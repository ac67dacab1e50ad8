use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Inline binary content tagged with a MIME type. `data` is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// One piece of message content. Serializes to either `{"text": ...}` or
/// `{"inlineData": {"mimeType": ..., "data": ...}}`; part order within a
/// message is significant and round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::Inline {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::Inline { .. } => None,
        }
    }

    /// True for a text part that is empty or whitespace. Inline parts always carry content.
    pub fn is_blank(&self) -> bool {
        match self {
            Part::Text { text } => text.trim().is_empty(),
            Part::Inline { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(rename = "isError", default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl Message {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
            is_error: None,
        }
    }

    /// Empty assistant message, filled in while its reply streams.
    pub fn assistant_placeholder() -> Self {
        Self::assistant_text(String::new())
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::text(text)],
            is_error: None,
        }
    }

    /// Assistant message standing in for a failed generation.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::text(text)],
            is_error: Some(true),
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }
}

/// Which generation variant a conversation uses. Fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelId {
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Flash,
    #[serde(rename = "gemini-2.5-pro")]
    Pro,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Flash => "gemini-2.5-flash",
            ModelId::Pro => "gemini-2.5-pro",
        }
    }
}

/// Ordinary chat vs. project-manifest-building conversation. Fixed at
/// creation; selects the generation entry point for every send. Defaults to
/// `Chat` so snapshots written before the field existed still load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationMode {
    #[default]
    Chat,
    Builder,
}

/// A single conversation with the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub model: ModelId,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub mode: ConversationMode,
}

impl Conversation {
    pub fn new(title: impl Into<String>, model: ModelId, mode: ConversationMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            model,
            created_at: Utc::now(),
            mode,
        }
    }

    /// Replace the trailing message wholesale. No-op on an empty conversation.
    pub fn replace_last_message(&mut self, message: Message) {
        if let Some(last) = self.messages.last_mut() {
            *last = message;
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

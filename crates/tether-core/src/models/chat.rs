//! Chat and chat message models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EntityKind, RecordId, SyncableRecord};
use crate::util::{normalize_text_option, now_millis};

/// An assistant conversation scoped to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: RecordId,
    #[serde(rename = "databaseId")]
    pub connection_id: RecordId,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    #[must_use]
    pub fn new(connection_id: RecordId, title: Option<String>) -> Self {
        let now = now_millis();
        Self {
            id: RecordId::new(),
            connection_id,
            title: normalize_text_option(title),
            created_at: now,
            updated_at: now,
        }
    }
}

impl SyncableRecord for Chat {
    const KIND: EntityKind = EntityKind::Chats;

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown message role `{other}`"
            ))),
        }
    }
}

/// One message inside a chat. Message content is opaque JSON parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: RecordId,
    pub chat_id: RecordId,
    pub role: MessageRole,
    pub parts: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatMessage {
    #[must_use]
    pub fn new(chat_id: RecordId, role: MessageRole, parts: Value) -> Self {
        let now = now_millis();
        Self {
            id: RecordId::new(),
            chat_id,
            role,
            parts,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Plain-text rendering of the `text` parts.
    pub fn text(&self) -> String {
        self.parts
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

impl SyncableRecord for ChatMessage {
    const KIND: EntityKind = EntityKind::ChatMessages;

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

//! Row mappings for each synced collection.

use libsql::{Row, Value};

use super::table::{
    get_bool, get_id, get_json, get_optional_json, get_optional_text, get_parsed, get_text,
    get_timestamp, id_value, json_text, millis, optional_text, text, TableRecord,
};
use crate::error::Result;
use crate::models::{Chat, ChatMessage, Connection, SavedQuery};

impl TableRecord for Connection {
    const TABLE: &'static str = "connections";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "kind",
        "connection_string",
        "label",
        "color",
        "sync_type",
        "is_password_exists",
        "created_at",
        "updated_at",
    ];

    fn to_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            id_value(self.id),
            text(self.name.as_str()),
            text(self.kind.as_str()),
            text(self.connection_string.as_str()),
            optional_text(self.label.as_deref()),
            optional_text(self.color.as_deref()),
            text(self.sync_type.as_str()),
            Value::Integer(i64::from(self.is_password_exists)),
            millis(self.created_at),
            millis(self.updated_at),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get_id(row, 0)?,
            name: get_text(row, 1)?,
            kind: get_parsed(row, 2)?,
            connection_string: get_text(row, 3)?,
            label: get_optional_text(row, 4)?,
            color: get_optional_text(row, 5)?,
            sync_type: get_parsed(row, 6)?,
            is_password_exists: get_bool(row, 7)?,
            created_at: get_timestamp(row, 8)?,
            updated_at: get_timestamp(row, 9)?,
        })
    }
}

impl TableRecord for SavedQuery {
    const TABLE: &'static str = "queries";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "connection_id",
        "name",
        "query",
        "created_at",
        "updated_at",
    ];

    fn to_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            id_value(self.id),
            id_value(self.connection_id),
            text(self.name.as_str()),
            text(self.query.as_str()),
            millis(self.created_at),
            millis(self.updated_at),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get_id(row, 0)?,
            connection_id: get_id(row, 1)?,
            name: get_text(row, 2)?,
            query: get_text(row, 3)?,
            created_at: get_timestamp(row, 4)?,
            updated_at: get_timestamp(row, 5)?,
        })
    }
}

impl TableRecord for Chat {
    const TABLE: &'static str = "chats";
    const COLUMNS: &'static [&'static str] =
        &["id", "connection_id", "title", "created_at", "updated_at"];

    fn to_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            id_value(self.id),
            id_value(self.connection_id),
            optional_text(self.title.as_deref()),
            millis(self.created_at),
            millis(self.updated_at),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get_id(row, 0)?,
            connection_id: get_id(row, 1)?,
            title: get_optional_text(row, 2)?,
            created_at: get_timestamp(row, 3)?,
            updated_at: get_timestamp(row, 4)?,
        })
    }
}

impl TableRecord for ChatMessage {
    const TABLE: &'static str = "chat_messages";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "chat_id",
        "role",
        "parts",
        "metadata",
        "created_at",
        "updated_at",
    ];

    fn to_values(&self) -> Result<Vec<Value>> {
        let metadata = match &self.metadata {
            Some(metadata) => json_text(metadata)?,
            None => Value::Null,
        };
        Ok(vec![
            id_value(self.id),
            id_value(self.chat_id),
            text(self.role.as_str()),
            json_text(&self.parts)?,
            metadata,
            millis(self.created_at),
            millis(self.updated_at),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get_id(row, 0)?,
            chat_id: get_id(row, 1)?,
            role: get_parsed(row, 2)?,
            parts: get_json(row, 3)?,
            metadata: get_optional_json(row, 4)?,
            created_at: get_timestamp(row, 5)?,
            updated_at: get_timestamp(row, 6)?,
        })
    }
}

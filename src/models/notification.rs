use serde::{Deserialize, Serialize};

use crate::models::common::flexible_id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadStatus {
    Unread,
    Read,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id")]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub read_status: Option<ReadStatus>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub read_status: ReadStatus,
    pub created_at: Option<String>,
}

impl Notification {
    pub fn from_record(record: NotificationRecord) -> Option<Self> {
        Some(Self {
            id: record.id.or(record.legacy_id)?,
            message: record.message.unwrap_or_default(),
            read_status: record.read_status.unwrap_or(ReadStatus::Unread),
            created_at: record.created_at,
        })
    }

    pub fn is_unread(&self) -> bool {
        self.read_status == ReadStatus::Unread
    }
}

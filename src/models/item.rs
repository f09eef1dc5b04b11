//! Inbound item and scan task types carried through the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "item_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Message,
    File,
}

/// Where an item came from on the source platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemSource {
    pub channel: String,
    /// Platform-native identifier (message timestamp or file id) used for
    /// the per-item scan lock and the finding uniqueness constraint.
    pub platform_message_id: String,
    pub user_id: String,
}

/// Content payload of an inbound item.
///
/// Message bodies travel inline; file content is fetched by the worker from
/// the referenced URL so oversized uploads never transit the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemContent {
    Message { body: String },
    File {
        file_id: String,
        file_name: String,
        download_url: String,
    },
}

/// One inbound message or file share, alive only for the duration of a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundItem {
    pub source: ItemSource,
    pub content: ItemContent,
    pub received_at: DateTime<Utc>,
}

impl InboundItem {
    pub fn kind(&self) -> ItemKind {
        match self.content {
            ItemContent::Message { .. } => ItemKind::Message,
            ItemContent::File { .. } => ItemKind::File,
        }
    }

    /// File name for file items, None for messages.
    pub fn file_name(&self) -> Option<&str> {
        match &self.content {
            ItemContent::File { file_name, .. } => Some(file_name),
            ItemContent::Message { .. } => None,
        }
    }
}

/// Unit of work on the queue: extract and detect on one inbound item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanTask {
    pub id: Uuid,
    pub item: InboundItem,
    pub enqueued_at: DateTime<Utc>,
    pub attempt_count: u32,
}

impl ScanTask {
    pub fn new(item: InboundItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            item,
            enqueued_at: Utc::now(),
            attempt_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_item() -> InboundItem {
        InboundItem {
            source: ItemSource {
                channel: "C123".to_string(),
                platform_message_id: "1700000000.000100".to_string(),
                user_id: "U456".to_string(),
            },
            content: ItemContent::Message {
                body: "hello team".to_string(),
            },
            received_at: Utc::now(),
        }
    }

    #[test]
    fn item_kind_follows_content() {
        let item = message_item();
        assert_eq!(item.kind(), ItemKind::Message);
        assert!(item.file_name().is_none());

        let file = InboundItem {
            content: ItemContent::File {
                file_id: "F1".to_string(),
                file_name: "report.txt".to_string(),
                download_url: "https://files.example/F1".to_string(),
            },
            ..item
        };
        assert_eq!(file.kind(), ItemKind::File);
        assert_eq!(file.file_name(), Some("report.txt"));
    }

    #[test]
    fn scan_task_round_trips_through_json() {
        let task = ScanTask::new(message_item());
        let json = serde_json::to_string(&task).unwrap();
        let back: ScanTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
        assert_eq!(back.attempt_count, 0);
    }

    #[test]
    fn item_content_tagged_serialization() {
        let content = ItemContent::Message {
            body: "x".to_string(),
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["kind"], "message");
    }
}

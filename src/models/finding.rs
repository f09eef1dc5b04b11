//! Finding model: a persisted record of a positive pattern match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::item::ItemKind;
use crate::models::pattern::SeverityLevel;

/// Outcome of the action flow for a flagged item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "action_taken", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    None,
    Blocked,
    /// The block call failed after all retries; left for operator
    /// reconciliation rather than silently marked handled.
    AttemptedFailed,
}

/// A persisted match. Immutable after creation except for `action_taken`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Finding {
    pub id: Uuid,
    pub channel_id: String,
    pub platform_message_id: String,
    pub user_id: String,
    pub item_kind: ItemKind,
    pub file_name: Option<String>,
    pub pattern_id: Uuid,
    pub match_start: i32,
    pub match_end: i32,
    /// Redacted snippet of the matched text, bounded in length. Never the
    /// full raw content.
    pub excerpt: String,
    /// True when the scanned content was truncated at the size cap, i.e.
    /// coverage of the original item was partial.
    pub truncated: bool,
    pub action_taken: ActionTaken,
    pub created_at: DateTime<Utc>,
}

/// Finding joined with its triggering pattern, for audit display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FindingWithPattern {
    pub id: Uuid,
    pub channel_id: String,
    pub platform_message_id: String,
    pub user_id: String,
    pub item_kind: ItemKind,
    pub file_name: Option<String>,
    pub pattern_id: Uuid,
    pub pattern_name: String,
    pub severity: SeverityLevel,
    pub excerpt: String,
    pub truncated: bool,
    pub action_taken: ActionTaken,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing findings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FindingFilters {
    pub channel_id: Option<String>,
    pub item_kind: Option<ItemKind>,
    pub action_taken: Option<ActionTaken>,
    pub pattern_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_taken_serialization() {
        assert_eq!(
            serde_json::to_string(&ActionTaken::AttemptedFailed).unwrap(),
            "\"attempted_failed\""
        );
        assert_eq!(serde_json::to_string(&ActionTaken::None).unwrap(), "\"none\"");
    }

    #[test]
    fn item_kind_serialization() {
        assert_eq!(serde_json::to_string(&ItemKind::File).unwrap(), "\"file\"");
    }

    #[test]
    fn finding_filters_from_query() {
        let f: FindingFilters =
            serde_json::from_str(r#"{"channel_id": "C1", "action_taken": "blocked"}"#).unwrap();
        assert_eq!(f.channel_id.as_deref(), Some("C1"));
        assert_eq!(f.action_taken, Some(ActionTaken::Blocked));
        assert!(f.pattern_id.is_none());
    }
}

//! Detection pattern model: an enableable, named regex rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "severity_level")]
pub enum SeverityLevel {
    Critical,
    High,
    Medium,
    Low,
}

/// A detection rule. Disabled patterns are excluded from every scan but are
/// never physically deleted while findings reference them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pattern {
    pub id: Uuid,
    pub name: String,
    pub regex: String,
    pub description: String,
    pub severity: SeverityLevel,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePattern {
    pub name: String,
    pub regex: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_severity")]
    pub severity: SeverityLevel,
}

fn default_severity() -> SeverityLevel {
    SeverityLevel::Medium
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePattern {
    pub regex: Option<String>,
    pub description: Option<String>,
    pub severity: Option<SeverityLevel>,
    pub enabled: Option<bool>,
}

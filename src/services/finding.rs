//! Finding persistence: idempotent creation, action recording, audit reads.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::finding::{ActionTaken, Finding, FindingFilters, FindingWithPattern};
use crate::models::item::InboundItem;
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::detection::PatternMatch;

/// Persist one finding per matched pattern for an item.
///
/// Creation is idempotent on `(platform_message_id, pattern_id)`; the
/// returned ids cover only rows actually inserted, so a redelivered task
/// that races or repeats an earlier scan inserts nothing and the caller
/// can tell.
pub async fn create_for_item(
    pool: &PgPool,
    item: &InboundItem,
    matches: &[PatternMatch],
    truncated: bool,
) -> Result<Vec<Uuid>, AppError> {
    let mut inserted = Vec::new();

    for m in matches {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO findings (
                channel_id, platform_message_id, user_id, item_kind, file_name,
                pattern_id, match_start, match_end, excerpt, truncated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (platform_message_id, pattern_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&item.source.channel)
        .bind(&item.source.platform_message_id)
        .bind(&item.source.user_id)
        .bind(item.kind())
        .bind(item.file_name())
        .bind(m.pattern_id)
        .bind(m.start as i32)
        .bind(m.end as i32)
        .bind(&m.excerpt)
        .bind(truncated)
        .fetch_optional(pool)
        .await?;

        if let Some(id) = id {
            inserted.push(id);
        }
    }

    Ok(inserted)
}

/// True when any of the item's findings still await an action outcome.
///
/// A redelivered task whose findings already exist uses this to tell a
/// fully handled item from one whose first pass stopped between
/// persistence and the block action.
pub async fn has_pending_action(
    pool: &PgPool,
    platform_message_id: &str,
) -> Result<bool, AppError> {
    let pending = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM findings
            WHERE platform_message_id = $1 AND action_taken = 'none'
        )
        "#,
    )
    .bind(platform_message_id)
    .fetch_one(pool)
    .await?;
    Ok(pending)
}

/// Record the action flow outcome on every finding of an item.
pub async fn record_action(
    pool: &PgPool,
    platform_message_id: &str,
    action: ActionTaken,
) -> Result<(), AppError> {
    sqlx::query("UPDATE findings SET action_taken = $1 WHERE platform_message_id = $2")
        .bind(action)
        .bind(platform_message_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Finding, AppError> {
    sqlx::query_as::<_, Finding>("SELECT * FROM findings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Finding not found".to_string()))
}

/// List findings joined with their triggering pattern, newest first.
pub async fn list(
    pool: &PgPool,
    filters: &FindingFilters,
    pagination: &Pagination,
) -> Result<PagedResult<FindingWithPattern>, AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM findings f
        WHERE ($1::text IS NULL OR f.channel_id = $1)
          AND ($2::item_kind IS NULL OR f.item_kind = $2)
          AND ($3::action_taken IS NULL OR f.action_taken = $3)
          AND ($4::uuid IS NULL OR f.pattern_id = $4)
        "#,
    )
    .bind(&filters.channel_id)
    .bind(filters.item_kind)
    .bind(filters.action_taken)
    .bind(filters.pattern_id)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, FindingWithPattern>(
        r#"
        SELECT f.id, f.channel_id, f.platform_message_id, f.user_id,
               f.item_kind, f.file_name, f.pattern_id,
               p.name AS pattern_name, p.severity,
               f.excerpt, f.truncated, f.action_taken, f.created_at
        FROM findings f
        JOIN patterns p ON p.id = f.pattern_id
        WHERE ($1::text IS NULL OR f.channel_id = $1)
          AND ($2::item_kind IS NULL OR f.item_kind = $2)
          AND ($3::action_taken IS NULL OR f.action_taken = $3)
          AND ($4::uuid IS NULL OR f.pattern_id = $4)
        ORDER BY f.created_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(&filters.channel_id)
    .bind(filters.item_kind)
    .bind(filters.action_taken)
    .bind(filters.pattern_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(PagedResult::new(items, total, pagination))
}

//! Pattern registry: the mutable, admin-managed set of detection rules.
//!
//! Backed by the `patterns` table, with an in-memory snapshot of compiled
//! active patterns. Writes validate the regex, hit the database, then swap
//! in a freshly compiled snapshot wholesale — concurrent readers observe
//! either the pre- or post-update set, never a partially updated one.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pattern::{CreatePattern, Pattern, UpdatePattern};

/// Upper bound on the compiled automaton, so oversized expressions are
/// rejected at write time rather than discovered mid-scan.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Postgres error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// A pattern with its compiled expression, ready for scanning.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub meta: Pattern,
    pub regex: Regex,
}

/// Registry of detection patterns with an atomically swapped active set.
pub struct PatternRegistry {
    pool: PgPool,
    active: RwLock<Arc<Vec<CompiledPattern>>>,
}

/// Compile a single expression under the registry's size limit.
pub fn compile_regex(expr: &str) -> Result<Regex, AppError> {
    RegexBuilder::new(expr)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| AppError::Validation(format!("Invalid regex: {e}")))
}

/// Compile the enabled subset of `rows`, in creation order. Rows that no
/// longer compile (e.g. edited out from under us) are skipped with a log
/// rather than poisoning the snapshot.
pub fn compile_active(rows: &[Pattern]) -> Vec<CompiledPattern> {
    rows.iter()
        .filter(|p| p.enabled)
        .filter_map(|p| match compile_regex(&p.regex) {
            Ok(regex) => Some(CompiledPattern {
                meta: p.clone(),
                regex,
            }),
            Err(e) => {
                tracing::error!(pattern = %p.name, error = %e, "Skipping uncompilable pattern");
                None
            }
        })
        .collect()
}

impl PatternRegistry {
    /// Create a registry and load the initial snapshot from the database.
    pub async fn load(pool: PgPool) -> Result<Self, AppError> {
        let registry = Self {
            pool,
            active: RwLock::new(Arc::new(Vec::new())),
        };
        registry.reload().await?;
        Ok(registry)
    }

    /// Current active set. The returned Arc stays valid for the caller's
    /// whole scan even if an administrator swaps the set mid-flight.
    pub async fn snapshot(&self) -> Arc<Vec<CompiledPattern>> {
        self.active.read().await.clone()
    }

    /// Re-read active rows from the database, compile, and swap.
    pub async fn reload(&self) -> Result<(), AppError> {
        let rows = sqlx::query_as::<_, Pattern>(
            "SELECT * FROM patterns WHERE enabled = true ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let compiled = compile_active(&rows);
        tracing::debug!(count = compiled.len(), "Reloaded pattern snapshot");
        *self.active.write().await = Arc::new(compiled);
        Ok(())
    }

    /// List all patterns, including disabled ones, for the admin surface.
    pub async fn list(&self) -> Result<Vec<Pattern>, AppError> {
        let rows = sqlx::query_as::<_, Pattern>("SELECT * FROM patterns ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Pattern, AppError> {
        sqlx::query_as::<_, Pattern>("SELECT * FROM patterns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Pattern not found".to_string()))
    }

    /// Add a pattern. Fails when the regex does not compile or the name is
    /// already taken; on success the active set takes effect for the next
    /// scan without a restart.
    pub async fn add(&self, input: &CreatePattern) -> Result<Pattern, AppError> {
        compile_regex(&input.regex)?;

        let created = sqlx::query_as::<_, Pattern>(
            r#"
            INSERT INTO patterns (name, regex, description, severity)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.regex)
        .bind(&input.description)
        .bind(&input.severity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &input.name))?;

        self.reload().await?;
        tracing::info!(pattern = %created.name, id = %created.id, "Pattern added");
        Ok(created)
    }

    /// Update a pattern's regex, description, severity, or enabled flag.
    pub async fn update(&self, id: Uuid, input: &UpdatePattern) -> Result<Pattern, AppError> {
        if let Some(expr) = &input.regex {
            compile_regex(expr)?;
        }

        let updated = sqlx::query_as::<_, Pattern>(
            r#"
            UPDATE patterns
            SET regex = COALESCE($2, regex),
                description = COALESCE($3, description),
                severity = COALESCE($4, severity),
                enabled = COALESCE($5, enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.regex)
        .bind(&input.description)
        .bind(&input.severity)
        .bind(input.enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Pattern not found".to_string()))?;

        self.reload().await?;
        Ok(updated)
    }

    /// Disable a pattern. Idempotent: disabling an already-disabled pattern
    /// succeeds without effect.
    pub async fn disable(&self, id: Uuid) -> Result<Pattern, AppError> {
        let disabled = sqlx::query_as::<_, Pattern>(
            r#"
            UPDATE patterns
            SET enabled = false, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Pattern not found".to_string()))?;

        self.reload().await?;
        tracing::info!(pattern = %disabled.name, id = %id, "Pattern disabled");
        Ok(disabled)
    }
}

fn map_unique_violation(e: sqlx::Error, name: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return AppError::Conflict(format!("Pattern name '{name}' already exists"));
        }
    }
    AppError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pattern::SeverityLevel;
    use chrono::Utc;

    fn pattern(name: &str, regex: &str, enabled: bool) -> Pattern {
        Pattern {
            id: Uuid::new_v4(),
            name: name.to_string(),
            regex: regex.to_string(),
            description: String::new(),
            severity: SeverityLevel::Medium,
            enabled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn compile_regex_rejects_invalid_expression() {
        let err = compile_regex("(unclosed").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn compile_regex_accepts_card_pattern() {
        let re = compile_regex(r"\d{4}-\d{4}-\d{4}-\d{4}").unwrap();
        assert!(re.is_match("card is 4111-1111-1111-1111"));
    }

    #[test]
    fn compile_regex_enforces_size_limit() {
        // A bounded repetition large enough to blow past the automaton cap.
        let err = compile_regex(&format!("(a{{1,{}}}){{1,{}}}", 10_000, 10_000)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn compile_active_excludes_disabled_patterns() {
        let rows = vec![
            pattern("card", r"\d{16}", true),
            pattern("off", r"secret", false),
        ];
        let compiled = compile_active(&rows);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].meta.name, "card");
    }

    #[test]
    fn compile_active_skips_broken_rows() {
        let rows = vec![
            pattern("ok", r"\d+", true),
            pattern("broken", "(", true),
        ];
        let compiled = compile_active(&rows);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].meta.name, "ok");
    }

    #[test]
    fn compile_active_preserves_order() {
        let rows = vec![
            pattern("first", "a", true),
            pattern("second", "b", true),
            pattern("third", "c", true),
        ];
        let names: Vec<_> = compile_active(&rows)
            .iter()
            .map(|c| c.meta.name.clone())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }
}

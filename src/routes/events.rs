//! Inbound platform event endpoint.
//!
//! Verifies the request signature before touching the payload, answers the
//! url_verification handshake, deduplicates by event id, and enqueues scan
//! tasks. Returns immediately — the scan itself happens on the workers.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::item::ScanTask;
use crate::services::intake::{self, IntakeOutcome};
use crate::AppState;

const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// POST /api/v1/events/slack — signed event callback from the platform.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;
    let signature = header(&headers, SIGNATURE_HEADER)?;

    intake::verify_signature(
        &state.config.signing_secret,
        timestamp,
        signature,
        &body,
        Utc::now(),
        state.config.replay_window_secs,
    )?;

    match intake::parse_event(&body)? {
        IntakeOutcome::Challenge(challenge) => Ok(Json(json!({ "challenge": challenge }))),
        IntakeOutcome::Ignored => Ok(Json(json!({ "ok": true }))),
        IntakeOutcome::Items { event_id, items } => {
            // Platform redeliveries are acknowledged without re-enqueueing.
            let dedup_ttl = (state.config.replay_window_secs as u64) * 2;
            if !state.queue.dedup_event(&event_id, dedup_ttl).await? {
                tracing::debug!(event_id = %event_id, "Duplicate event acknowledged");
                return Ok(Json(json!({ "ok": true })));
            }

            let count = items.len();
            for item in items {
                state.queue.enqueue(&ScanTask::new(item)).await?;
            }
            tracing::info!(event_id = %event_id, tasks = count, "Event accepted");
            Ok(Json(json!({ "ok": true })))
        }
    }
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::UnverifiedEvent(format!("missing {name} header")))
}

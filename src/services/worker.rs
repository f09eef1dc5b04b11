//! Scan workers: dequeue tasks, run extraction and detection, persist
//! findings, and drive the action flow.
//!
//! Per task: `Received -> Extracting -> Scanning -> {Clean, Flagged} ->
//! Acknowledged`, acknowledging only after persistence and the action flow
//! complete — a crash mid-task causes redelivery, never silent loss. The
//! per-item Redis lock plus the finding uniqueness constraint keep block
//! actions at most-once per item across redeliveries.

use std::time::Duration;

use crate::models::finding::ActionTaken;
use crate::models::item::InboundItem;
use crate::services::{action, detection, extractor, finding, queue::Delivery};
use crate::AppState;

/// How long a dequeue blocks before the loop comes back around.
const DEQUEUE_WAIT_SECS: f64 = 5.0;

/// Terminal state of one processed task.
#[derive(Debug, PartialEq, Eq)]
enum TaskOutcome {
    /// No pattern matched.
    Clean,
    /// Findings persisted and the action flow ran.
    Flagged,
    /// Content not text-decodable; acknowledged without a finding.
    Unsupported,
    /// Another delivery already created this item's findings and recorded
    /// the action outcome.
    AlreadyHandled,
}

/// Run one worker until the process exits. Errors on individual tasks are
/// logged and lead to redelivery; they never stop the pool.
pub async fn run(state: AppState, worker_id: usize) {
    tracing::info!(worker_id, "Scan worker started");
    loop {
        match state.queue.dequeue(DEQUEUE_WAIT_SECS).await {
            Ok(Some(delivery)) => {
                process(&state, worker_id, delivery).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(worker_id, error = %e, "Dequeue failed, backing off");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Periodically return timed-out tasks to the pending list.
pub async fn run_reaper(state: AppState) {
    let interval = Duration::from_secs((state.config.visibility_timeout_secs / 2).max(1));
    loop {
        tokio::time::sleep(interval).await;
        match state.queue.reap().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(redelivered = n, "Reaper requeued timed-out tasks"),
            Err(e) => tracing::error!(error = %e, "Reaper pass failed"),
        }
    }
}

async fn process(state: &AppState, worker_id: usize, delivery: Delivery) {
    let item_id = delivery.task.item.source.platform_message_id.clone();

    let locked = match state.queue.try_lock_item(&item_id).await {
        Ok(locked) => locked,
        Err(e) => {
            tracing::error!(worker_id, item_id = %item_id, error = %e, "Lock acquisition failed");
            return; // left unacked; redelivered after the visibility timeout
        }
    };

    if !locked {
        // A concurrent delivery of the same item holds the lock. Ack this
        // copy; the uniqueness constraint protects the outcome.
        tracing::debug!(worker_id, item_id = %item_id, "Item locked elsewhere, dropping duplicate");
        if let Err(e) = state.queue.ack(&delivery).await {
            tracing::error!(worker_id, error = %e, "Ack of duplicate task failed");
        }
        return;
    }

    let result = handle_task(state, &delivery).await;

    if let Err(e) = state.queue.unlock_item(&item_id).await {
        tracing::warn!(worker_id, item_id = %item_id, error = %e, "Item unlock failed");
    }

    match result {
        Ok(outcome) => {
            tracing::info!(
                worker_id,
                task_id = %delivery.task.id,
                item_id = %item_id,
                outcome = ?outcome,
                "Task processed"
            );
            if let Err(e) = state.queue.ack(&delivery).await {
                tracing::error!(worker_id, error = %e, "Ack failed, task will be redelivered");
            }
        }
        Err(e) => {
            // Not acked: the reaper redelivers after the visibility timeout.
            tracing::error!(
                worker_id,
                task_id = %delivery.task.id,
                item_id = %item_id,
                error = %e,
                "Task failed, leaving for redelivery"
            );
        }
    }
}

async fn handle_task(state: &AppState, delivery: &Delivery) -> anyhow::Result<TaskOutcome> {
    let item = &delivery.task.item;

    // Extracting
    let extracted = match extractor::extract(item, &state.platform, state.config.max_scan_bytes)
        .await
    {
        Ok(extracted) => extracted,
        Err(extractor::ExtractionError::Unsupported(reason)) => {
            tracing::info!(
                item_id = %item.source.platform_message_id,
                reason = %reason,
                "Unsupported content, acknowledging without a finding"
            );
            return Ok(TaskOutcome::Unsupported);
        }
        Err(e @ extractor::ExtractionError::Fetch(_)) => return Err(e.into()),
    };

    // Scanning — against the snapshot captured at task start; a concurrent
    // registry update legitimately applies only to later tasks.
    let patterns = state.registry.snapshot().await;
    let budget = Duration::from_millis(state.config.pattern_budget_ms);
    let matches = detection::scan(&extracted.text, &patterns, budget);

    if matches.is_empty() {
        return Ok(TaskOutcome::Clean);
    }

    // Flagged: persist findings, then act. Zero inserted rows means an
    // earlier delivery of this item persisted them already.
    let inserted =
        finding::create_for_item(&state.db, item, &matches, extracted.truncated).await?;
    if inserted.is_empty() {
        // Done only if that pass also recorded an action outcome. Rows
        // still at `none` mean it stopped between persistence and the
        // block, so this delivery finishes the action.
        if !finding::has_pending_action(&state.db, &item.source.platform_message_id).await? {
            return Ok(TaskOutcome::AlreadyHandled);
        }
        tracing::warn!(
            item_id = %item.source.platform_message_id,
            "Findings persisted without an action outcome, resuming block"
        );
    }

    run_block_action(state, item).await?;
    Ok(TaskOutcome::Flagged)
}

/// Apply the block action and record its outcome on the item's findings.
async fn run_block_action(state: &AppState, item: &InboundItem) -> anyhow::Result<()> {
    match action::apply(&state.platform, item, state.config.action_max_attempts).await {
        Ok(()) => {
            finding::record_action(
                &state.db,
                &item.source.platform_message_id,
                ActionTaken::Blocked,
            )
            .await?;
        }
        Err(e) => {
            // Recorded for operator reconciliation; the task still acks so
            // it does not loop.
            tracing::error!(
                item_id = %item.source.platform_message_id,
                error = %e,
                "Block action exhausted retries"
            );
            finding::record_action(
                &state.db,
                &item.source.platform_message_id,
                ActionTaken::AttemptedFailed,
            )
            .await?;
        }
    }
    Ok(())
}

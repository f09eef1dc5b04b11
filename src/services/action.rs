//! Action flow: block flagged content at the source platform.
//!
//! Messages are replaced in place with a fixed policy notice; files are
//! deleted and the notice posted to the channel. The notice never carries
//! the matched excerpt or any pattern detail. Failures retry with
//! exponential backoff up to a bounded attempt count; terminal failure is
//! surfaced so the caller records `attempted_failed` instead of silently
//! marking the item handled.

use std::sync::Arc;
use std::time::Duration;

use crate::models::item::{InboundItem, ItemContent};
use crate::platform::{ChatPlatform, PlatformError};

/// Outward-facing notice for a replaced message.
pub const MESSAGE_BLOCK_NOTICE: &str =
    "This message was removed because it matched a data loss prevention policy. \
     Contact your workspace administrator if you believe this was a mistake.";

/// Outward-facing notice posted after a flagged file is deleted.
pub const FILE_BLOCK_NOTICE: &str =
    "A shared file was removed because it matched a data loss prevention policy. \
     Contact your workspace administrator if you believe this was a mistake.";

/// Delay before the second attempt; doubles each retry.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("block action failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: PlatformError },
}

/// Block an item's content at the source platform, retrying on failure.
pub async fn apply(
    platform: &Arc<dyn ChatPlatform>,
    item: &InboundItem,
    max_attempts: u32,
) -> Result<(), ActionError> {
    apply_with_backoff(platform, item, max_attempts, BACKOFF_BASE).await
}

pub async fn apply_with_backoff(
    platform: &Arc<dyn ChatPlatform>,
    item: &InboundItem,
    max_attempts: u32,
    backoff_base: Duration,
) -> Result<(), ActionError> {
    let max_attempts = max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        match block_once(platform, item).await {
            Ok(()) => {
                tracing::info!(
                    channel = %item.source.channel,
                    item_id = %item.source.platform_message_id,
                    attempt,
                    "Blocked flagged content"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    channel = %item.source.channel,
                    item_id = %item.source.platform_message_id,
                    attempt,
                    error = %e,
                    "Block action failed"
                );
                last_err = Some(e);
                if attempt < max_attempts {
                    tokio::time::sleep(backoff_base * 2u32.pow(attempt - 1)).await;
                }
            }
        }
    }

    Err(ActionError::Exhausted {
        attempts: max_attempts,
        last: last_err.expect("at least one attempt was made"),
    })
}

async fn block_once(
    platform: &Arc<dyn ChatPlatform>,
    item: &InboundItem,
) -> Result<(), PlatformError> {
    match &item.content {
        ItemContent::Message { .. } => {
            platform
                .update_message(
                    &item.source.channel,
                    &item.source.platform_message_id,
                    MESSAGE_BLOCK_NOTICE,
                )
                .await
        }
        ItemContent::File { file_id, .. } => {
            platform.delete_file(file_id).await?;
            platform
                .post_message(&item.source.channel, FILE_BLOCK_NOTICE)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::ItemSource;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records calls; fails the first `fail_first` update/delete attempts.
    struct FlakyPlatform {
        fail_first: u32,
        calls: Mutex<Vec<String>>,
    }

    impl FlakyPlatform {
        fn new(fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                fail_first,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, call: String) -> Result<(), PlatformError> {
            let mut calls = self.calls.lock().unwrap();
            let blocking_calls = calls
                .iter()
                .filter(|c| c.starts_with("update:") || c.starts_with("delete:"))
                .count() as u32;
            calls.push(call);
            if blocking_calls < self.fail_first {
                Err(PlatformError::Api("ratelimited".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ChatPlatform for FlakyPlatform {
        async fn update_message(
            &self,
            channel: &str,
            message_id: &str,
            text: &str,
        ) -> Result<(), PlatformError> {
            assert!(!text.contains("4111"), "notice must not leak content");
            self.record(format!("update:{channel}:{message_id}"))
        }
        async fn delete_file(&self, file_id: &str) -> Result<(), PlatformError> {
            self.record(format!("delete:{file_id}"))
        }
        async fn post_message(&self, channel: &str, text: &str) -> Result<(), PlatformError> {
            assert!(text.contains("data loss prevention"));
            self.record(format!("post:{channel}"))
        }
        async fn fetch_file(&self, _: &str) -> Result<Vec<u8>, PlatformError> {
            unreachable!("action flow never fetches files")
        }
    }

    fn message_item() -> InboundItem {
        InboundItem {
            source: ItemSource {
                channel: "C1".to_string(),
                platform_message_id: "1700000000.000100".to_string(),
                user_id: "U1".to_string(),
            },
            content: ItemContent::Message {
                body: "card is 4111-1111-1111-1111".to_string(),
            },
            received_at: Utc::now(),
        }
    }

    fn file_item() -> InboundItem {
        InboundItem {
            content: ItemContent::File {
                file_id: "F7".to_string(),
                file_name: "dump.txt".to_string(),
                download_url: "https://files.example/F7".to_string(),
            },
            ..message_item()
        }
    }

    #[tokio::test]
    async fn message_is_replaced_with_notice() {
        let platform = FlakyPlatform::new(0);
        let dynp: Arc<dyn ChatPlatform> = platform.clone();
        apply_with_backoff(&dynp, &message_item(), 3, Duration::ZERO)
            .await
            .unwrap();
        let calls = platform.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), ["update:C1:1700000000.000100"]);
    }

    #[tokio::test]
    async fn file_is_deleted_and_notice_posted() {
        let platform = FlakyPlatform::new(0);
        let dynp: Arc<dyn ChatPlatform> = platform.clone();
        apply_with_backoff(&dynp, &file_item(), 3, Duration::ZERO)
            .await
            .unwrap();
        let calls = platform.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), ["delete:F7", "post:C1"]);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_to_success() {
        let platform = FlakyPlatform::new(2);
        let dynp: Arc<dyn ChatPlatform> = platform.clone();
        apply_with_backoff(&dynp, &message_item(), 3, Duration::ZERO)
            .await
            .unwrap();
        let calls = platform.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn persistent_failure_is_terminal_after_max_attempts() {
        let platform = FlakyPlatform::new(u32::MAX);
        let dynp: Arc<dyn ChatPlatform> = platform.clone();
        let err = apply_with_backoff(&dynp, &message_item(), 3, Duration::ZERO)
            .await
            .unwrap_err();
        let ActionError::Exhausted { attempts, .. } = err;
        assert_eq!(attempts, 3);
        assert_eq!(platform.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn notices_do_not_mention_patterns_or_excerpts() {
        for notice in [MESSAGE_BLOCK_NOTICE, FILE_BLOCK_NOTICE] {
            assert!(notice.contains("data loss prevention"));
            assert!(!notice.contains("regex"));
            assert!(!notice.contains("pattern"));
        }
    }
}

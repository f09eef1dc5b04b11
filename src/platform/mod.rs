//! Chat platform capability interface.
//!
//! The pipeline talks to the source platform only through `ChatPlatform`:
//! replacing or deleting flagged content, posting notices, and fetching
//! shared file content. `slack` provides the production implementation.

pub mod slack;

use async_trait::async_trait;

/// Error from an outbound platform call.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Transport-level failure (connect, timeout). Retryable.
    #[error("platform request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The platform accepted the request but reported an API error.
    #[error("platform API error: {0}")]
    Api(String),
}

/// Outbound operations against the source chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Replace the text of an existing message by its platform id.
    async fn update_message(
        &self,
        channel: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), PlatformError>;

    /// Delete a shared file by its platform id.
    async fn delete_file(&self, file_id: &str) -> Result<(), PlatformError>;

    /// Post a new message to a channel.
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), PlatformError>;

    /// Download the raw content of a shared file.
    async fn fetch_file(&self, download_url: &str) -> Result<Vec<u8>, PlatformError>;
}

//! Content extractor: normalizes an inbound item into scannable text.
//!
//! Message bodies pass through verbatim. File content is downloaded from
//! the platform and must decode as UTF-8; anything else is unsupported and
//! acknowledged without a finding. Output is capped at the configured scan
//! size, with truncation recorded for coverage reporting.

use std::sync::Arc;

use crate::models::item::{InboundItem, ItemContent};
use crate::platform::{ChatPlatform, PlatformError};

/// Extraction failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Content is not text-decodable. Non-fatal: the item is acknowledged
    /// with no finding.
    #[error("unsupported content: {0}")]
    Unsupported(String),

    /// The file download failed. Retryable via queue redelivery.
    #[error("content fetch failed: {0}")]
    Fetch(#[from] PlatformError),
}

/// Scannable text plus whether the cap cut it short.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub truncated: bool,
}

/// Normalize an item into a flat string, capped at `max_scan_bytes`.
pub async fn extract(
    item: &InboundItem,
    platform: &Arc<dyn ChatPlatform>,
    max_scan_bytes: usize,
) -> Result<Extracted, ExtractionError> {
    match &item.content {
        ItemContent::Message { body } => Ok(cap(body.clone(), max_scan_bytes)),
        ItemContent::File {
            file_name,
            download_url,
            ..
        } => {
            let bytes = platform.fetch_file(download_url).await?;
            let text = String::from_utf8(bytes).map_err(|_| {
                ExtractionError::Unsupported(format!("file '{file_name}' is not UTF-8 text"))
            })?;
            Ok(cap(text, max_scan_bytes))
        }
    }
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
fn cap(text: String, max_bytes: usize) -> Extracted {
    if text.len() <= max_bytes {
        return Extracted {
            text,
            truncated: false,
        };
    }

    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    Extracted {
        text: text[..cut].to_string(),
        truncated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{InboundItem, ItemContent, ItemSource};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Platform stub serving canned file bytes.
    struct FileServer {
        bytes: Vec<u8>,
    }

    #[async_trait]
    impl ChatPlatform for FileServer {
        async fn update_message(&self, _: &str, _: &str, _: &str) -> Result<(), PlatformError> {
            unreachable!("extractor never updates messages")
        }
        async fn delete_file(&self, _: &str) -> Result<(), PlatformError> {
            unreachable!("extractor never deletes files")
        }
        async fn post_message(&self, _: &str, _: &str) -> Result<(), PlatformError> {
            unreachable!("extractor never posts messages")
        }
        async fn fetch_file(&self, _: &str) -> Result<Vec<u8>, PlatformError> {
            Ok(self.bytes.clone())
        }
    }

    fn message(body: &str) -> InboundItem {
        InboundItem {
            source: ItemSource {
                channel: "C1".to_string(),
                platform_message_id: "1.0".to_string(),
                user_id: "U1".to_string(),
            },
            content: ItemContent::Message {
                body: body.to_string(),
            },
            received_at: Utc::now(),
        }
    }

    fn file_item() -> InboundItem {
        InboundItem {
            content: ItemContent::File {
                file_id: "F1".to_string(),
                file_name: "notes.txt".to_string(),
                download_url: "https://files.example/F1".to_string(),
            },
            ..message("")
        }
    }

    fn server(bytes: &[u8]) -> Arc<dyn ChatPlatform> {
        Arc::new(FileServer {
            bytes: bytes.to_vec(),
        })
    }

    #[tokio::test]
    async fn message_body_passes_through_verbatim() {
        let out = extract(&message("api_key=secret123"), &server(b""), 1024)
            .await
            .unwrap();
        assert_eq!(out.text, "api_key=secret123");
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn text_file_content_is_extracted() {
        let out = extract(&file_item(), &server(b"password=hunter2\n"), 1024)
            .await
            .unwrap();
        assert_eq!(out.text, "password=hunter2\n");
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn binary_file_is_unsupported() {
        // PNG magic bytes: not UTF-8 decodable.
        let out = extract(&file_item(), &server(&[0x89, 0x50, 0x4E, 0x47, 0xFF]), 1024).await;
        assert!(matches!(out, Err(ExtractionError::Unsupported(_))));
    }

    #[tokio::test]
    async fn content_at_cap_is_fully_scanned() {
        let body = "a".repeat(64);
        let out = extract(&message(&body), &server(b""), 64).await.unwrap();
        assert_eq!(out.text.len(), 64);
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn content_over_cap_is_truncated_and_flagged() {
        let body = "a".repeat(65);
        let out = extract(&message(&body), &server(b""), 64).await.unwrap();
        assert_eq!(out.text.len(), 64);
        assert!(out.truncated);
    }

    #[tokio::test]
    async fn truncation_backs_off_to_char_boundary() {
        // "é" is two bytes; a cap landing mid-char must back off.
        let body = "é".repeat(10);
        let out = extract(&message(&body), &server(b""), 5).await.unwrap();
        assert_eq!(out.text, "éé");
        assert!(out.truncated);
    }
}

//! Slack Web API implementation of `ChatPlatform`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ChatPlatform, PlatformError};

/// Bounded timeout for every outbound call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack Web API client authenticated with a bot token.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

/// Minimal Slack API response envelope.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// POST a JSON body to a Web API method and decode the `{ok, error}`
    /// envelope.
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), PlatformError> {
        let url = format!("{}/{method}", self.api_base);
        let resp: SlackResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.ok {
            Ok(())
        } else {
            Err(PlatformError::Api(
                resp.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn update_message(
        &self,
        channel: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.call(
            "chat.update",
            json!({ "channel": channel, "ts": message_id, "text": text }),
        )
        .await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), PlatformError> {
        self.call("files.delete", json!({ "file": file_id })).await
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<(), PlatformError> {
        self.call(
            "chat.postMessage",
            json!({ "channel": channel, "text": text }),
        )
        .await
    }

    async fn fetch_file(&self, download_url: &str) -> Result<Vec<u8>, PlatformError> {
        let bytes = self
            .http
            .get(download_url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

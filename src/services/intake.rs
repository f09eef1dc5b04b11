//! Event intake: verification and normalization of inbound platform events.
//!
//! Incoming webhooks are authenticated with the platform's v0 HMAC scheme
//! and a replay window before anything is parsed. Accepted events are
//! normalized into `InboundItem`s for enqueueing; the HTTP handler never
//! waits on a scan.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::errors::AppError;
use crate::models::item::{InboundItem, ItemContent, ItemSource};

type HmacSha256 = Hmac<Sha256>;

/// Signature version prefix used by the platform.
const SIGNATURE_VERSION: &str = "v0";

/// Verify the event signature and timestamp freshness.
///
/// The signature is `v0=hex(hmac_sha256(secret, "v0:{timestamp}:{body}"))`.
/// Comparison is constant-time via `Mac::verify_slice`.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    now: DateTime<Utc>,
    replay_window_secs: i64,
) -> Result<(), AppError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::UnverifiedEvent("malformed timestamp".to_string()))?;

    if (now.timestamp() - ts).abs() > replay_window_secs {
        return Err(AppError::UnverifiedEvent(
            "timestamp outside replay window".to_string(),
        ));
    }

    let hex_sig = signature
        .strip_prefix("v0=")
        .ok_or_else(|| AppError::UnverifiedEvent("missing signature version".to_string()))?;
    let expected = hex::decode(hex_sig)
        .map_err(|_| AppError::UnverifiedEvent("malformed signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("signing secret unusable: {e}")))?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| AppError::UnverifiedEvent("signature mismatch".to_string()))
}

/// Compute a valid signature header for a payload. Test/tooling helper.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

// -- Wire format of the event callback --

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    /// Endpoint ownership handshake: echo the challenge back.
    UrlVerification { challenge: String },
    EventCallback { event_id: String, event: WireEvent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    channel: Option<String>,
    user: Option<String>,
    text: Option<String>,
    ts: Option<String>,
    subtype: Option<String>,
    bot_id: Option<String>,
    #[serde(default)]
    files: Vec<WireFile>,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    id: String,
    name: String,
    url_private: String,
}

/// Result of parsing a verified event payload.
#[derive(Debug, PartialEq)]
pub enum IntakeOutcome {
    /// Respond with the challenge string; nothing to scan.
    Challenge(String),
    /// Scannable items, keyed by the platform event id for deduplication.
    Items {
        event_id: String,
        items: Vec<InboundItem>,
    },
    /// Event type or subtype the pipeline does not scan.
    Ignored,
}

/// Parse a verified payload into scannable items.
///
/// Message text and each shared file become separate items. Bot messages
/// and non-share subtypes (edits, deletions, joins) are ignored — the
/// pipeline only reacts to new user content.
pub fn parse_event(body: &[u8]) -> Result<IntakeOutcome, AppError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Malformed event payload: {e}")))?;

    let (event_id, event) = match envelope {
        Envelope::UrlVerification { challenge } => return Ok(IntakeOutcome::Challenge(challenge)),
        Envelope::EventCallback { event_id, event } => (event_id, event),
        Envelope::Other => return Ok(IntakeOutcome::Ignored),
    };

    if event.kind != "message" || event.bot_id.is_some() {
        return Ok(IntakeOutcome::Ignored);
    }
    match event.subtype.as_deref() {
        None | Some("file_share") => {}
        Some(_) => return Ok(IntakeOutcome::Ignored),
    }

    let (Some(channel), Some(ts)) = (event.channel, event.ts) else {
        return Ok(IntakeOutcome::Ignored);
    };
    let user = event.user.unwrap_or_default();
    let received_at = Utc::now();

    let mut items = Vec::new();

    if let Some(text) = event.text.filter(|t| !t.is_empty()) {
        items.push(InboundItem {
            source: ItemSource {
                channel: channel.clone(),
                platform_message_id: ts.clone(),
                user_id: user.clone(),
            },
            content: ItemContent::Message { body: text },
            received_at,
        });
    }

    for file in event.files {
        items.push(InboundItem {
            source: ItemSource {
                channel: channel.clone(),
                // Files get their own identity so a file and its caption
                // message are locked and deduplicated independently.
                platform_message_id: file.id.clone(),
                user_id: user.clone(),
            },
            content: ItemContent::File {
                file_id: file.id,
                file_name: file.name,
                download_url: file.url_private,
            },
            received_at,
        });
    }

    if items.is_empty() {
        return Ok(IntakeOutcome::Ignored);
    }
    Ok(IntakeOutcome::Items { event_id, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::ItemKind;
    use serde_json::json;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"type":"event_callback"}"#;
        let now = Utc::now();
        let ts = now.timestamp().to_string();
        let sig = sign(SECRET, &ts, body);
        assert!(verify_signature(SECRET, &ts, &sig, body, now, 300).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let now = Utc::now();
        let ts = now.timestamp().to_string();
        let sig = sign(SECRET, &ts, b"original");
        let err = verify_signature(SECRET, &ts, &sig, b"tampered", now, 300).unwrap_err();
        assert!(err.is_unverified());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"payload";
        let now = Utc::now();
        let ts = now.timestamp().to_string();
        let sig = sign("other-secret", &ts, body);
        assert!(verify_signature(SECRET, &ts, &sig, body, now, 300).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let body = b"payload";
        let now = Utc::now();
        let stale = (now.timestamp() - 301).to_string();
        let sig = sign(SECRET, &stale, body);
        let err = verify_signature(SECRET, &stale, &sig, body, now, 300).unwrap_err();
        assert!(err.is_unverified());
    }

    #[test]
    fn timestamp_at_window_edge_is_accepted() {
        let body = b"payload";
        let now = Utc::now();
        let edge = (now.timestamp() - 300).to_string();
        let sig = sign(SECRET, &edge, body);
        assert!(verify_signature(SECRET, &edge, &sig, body, now, 300).is_ok());
    }

    #[test]
    fn missing_version_prefix_is_rejected() {
        let now = Utc::now();
        let ts = now.timestamp().to_string();
        let err = verify_signature(SECRET, &ts, "deadbeef", b"x", now, 300).unwrap_err();
        assert!(err.is_unverified());
    }

    #[test]
    fn url_verification_echoes_challenge() {
        let body = json!({"type": "url_verification", "challenge": "ch4ll"}).to_string();
        let out = parse_event(body.as_bytes()).unwrap();
        assert_eq!(out, IntakeOutcome::Challenge("ch4ll".to_string()));
    }

    #[test]
    fn message_event_becomes_message_item() {
        let body = json!({
            "type": "event_callback",
            "event_id": "Ev001",
            "event": {
                "type": "message",
                "channel": "C123",
                "user": "U456",
                "text": "card is 4111-1111-1111-1111",
                "ts": "1700000000.000100"
            }
        })
        .to_string();

        let IntakeOutcome::Items { event_id, items } = parse_event(body.as_bytes()).unwrap()
        else {
            panic!("expected items");
        };
        assert_eq!(event_id, "Ev001");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind(), ItemKind::Message);
        assert_eq!(items[0].source.channel, "C123");
        assert_eq!(items[0].source.platform_message_id, "1700000000.000100");
    }

    #[test]
    fn file_share_produces_message_and_file_items() {
        let body = json!({
            "type": "event_callback",
            "event_id": "Ev002",
            "event": {
                "type": "message",
                "subtype": "file_share",
                "channel": "C123",
                "user": "U456",
                "text": "see attached",
                "ts": "1700000001.000200",
                "files": [
                    {"id": "F9", "name": "creds.txt", "url_private": "https://files.example/F9"}
                ]
            }
        })
        .to_string();

        let IntakeOutcome::Items { items, .. } = parse_event(body.as_bytes()).unwrap() else {
            panic!("expected items");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind(), ItemKind::Message);
        assert_eq!(items[1].kind(), ItemKind::File);
        assert_eq!(items[1].source.platform_message_id, "F9");
        assert_eq!(items[1].file_name(), Some("creds.txt"));
    }

    #[test]
    fn bot_messages_are_ignored() {
        let body = json!({
            "type": "event_callback",
            "event_id": "Ev003",
            "event": {
                "type": "message",
                "channel": "C123",
                "bot_id": "B42",
                "text": "automated notice",
                "ts": "1700000002.000300"
            }
        })
        .to_string();
        assert_eq!(parse_event(body.as_bytes()).unwrap(), IntakeOutcome::Ignored);
    }

    #[test]
    fn edit_subtype_is_ignored() {
        let body = json!({
            "type": "event_callback",
            "event_id": "Ev004",
            "event": {
                "type": "message",
                "subtype": "message_changed",
                "channel": "C123",
                "ts": "1700000003.000400"
            }
        })
        .to_string();
        assert_eq!(parse_event(body.as_bytes()).unwrap(), IntakeOutcome::Ignored);
    }

    #[test]
    fn unknown_envelope_type_is_ignored() {
        let body = json!({"type": "app_rate_limited"}).to_string();
        assert_eq!(parse_event(body.as_bytes()).unwrap(), IntakeOutcome::Ignored);
    }

    #[test]
    fn malformed_payload_is_a_validation_error() {
        let err = parse_event(b"not json").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

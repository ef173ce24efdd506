use axum::http::HeaderMap;
use serde_json::{json, Value};

use super::{header_str, VerificationError, VerifiedWebhookSource};
use crate::github::events::GithubEvent;
use crate::github::signature::verify_signature;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const DELIVERY_HEADER: &str = "x-github-delivery";
pub const EVENT_HEADER: &str = "x-github-event";

/// A GitHub delivery that passed signature verification.
#[derive(Debug)]
pub struct GithubDelivery {
    pub delivery_id: String,
    pub event_type: String,
    /// The stored document. Bodies that are not JSON are kept as a string.
    pub payload: Value,
    pub event: GithubEvent,
}

pub struct GithubWebhookSource {
    secret: String,
}

impl GithubWebhookSource {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl VerifiedWebhookSource for GithubWebhookSource {
    type Event = GithubDelivery;

    fn verify(&self, raw_body: &[u8], headers: &HeaderMap) -> Result<GithubDelivery, VerificationError> {
        if !verify_signature(&self.secret, raw_body, header_str(headers, SIGNATURE_HEADER)) {
            return Err(VerificationError::InvalidSignature);
        }

        let delivery_id = header_str(headers, DELIVERY_HEADER)
            .filter(|id| !id.is_empty())
            .ok_or(VerificationError::MissingHeader(DELIVERY_HEADER))?
            .to_string();
        let event_type = header_str(headers, EVENT_HEADER)
            .unwrap_or("unknown")
            .to_string();

        let payload = parse_payload(raw_body);
        let event = GithubEvent::parse(&event_type, &payload);

        Ok(GithubDelivery {
            delivery_id,
            event_type,
            payload,
            event,
        })
    }
}

fn parse_payload(raw_body: &[u8]) -> Value {
    if raw_body.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    serde_json::from_slice(raw_body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw_body).into_owned()))
}

pub mod dispatch;
pub mod github;
pub mod recorder;
pub mod svix;

use axum::http::HeaderMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    #[error("signature does not match payload")]
    InvalidSignature,

    #[error("webhook secret is malformed: {0}")]
    InvalidSecret(String),

    #[error("timestamp header is not a unix time")]
    InvalidTimestamp,

    #[error("timestamp is outside the accepted window")]
    TimestampOutOfTolerance,

    #[error("payload is not a valid event: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// An inbound webhook stream whose authenticity can be checked against the
/// raw body and headers, yielding a parsed event only on success.
pub trait VerifiedWebhookSource: Send + Sync {
    type Event;

    fn verify(&self, raw_body: &[u8], headers: &HeaderMap) -> Result<Self::Event, VerificationError>;
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

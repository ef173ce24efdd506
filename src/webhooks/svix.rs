//! Svix-style webhook signing, as used by Clerk.
//!
//! The sender signs `"{svix-id}.{svix-timestamp}.{body}"` with HMAC-SHA256
//! keyed by the base64 part of a `whsec_` secret and sends one or more
//! space-separated `v1,<base64>` signatures.

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{header_str, VerificationError, VerifiedWebhookSource};
use crate::clerk::ClerkEvent;
use crate::utils::unix_now;

type HmacSha256 = Hmac<Sha256>;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const TOLERANCE_SECS: u64 = 5 * 60;

pub struct SvixVerifier {
    key: Vec<u8>,
}

impl SvixVerifier {
    pub fn new(secret: &str) -> Result<Self, VerificationError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded)
            .map_err(|e| VerificationError::InvalidSecret(e.to_string()))?;
        Ok(Self { key })
    }

    /// MAC over the signed content. The timestamp is the header value as sent.
    fn mac(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, VerificationError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| VerificationError::InvalidSecret(e.to_string()))?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    #[cfg(test)]
    pub fn sign(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> String {
        let mac = self.mac(msg_id, timestamp, body).unwrap();
        STANDARD.encode(mac.finalize().into_bytes())
    }

    pub fn verify_at(&self, raw_body: &[u8], headers: &HeaderMap, now: i64) -> Result<(), VerificationError> {
        let msg_id = header_str(headers, ID_HEADER).ok_or(VerificationError::MissingHeader(ID_HEADER))?;
        let raw_timestamp = header_str(headers, TIMESTAMP_HEADER)
            .ok_or(VerificationError::MissingHeader(TIMESTAMP_HEADER))?;
        let signatures = header_str(headers, SIGNATURE_HEADER)
            .ok_or(VerificationError::MissingHeader(SIGNATURE_HEADER))?;

        let timestamp: i64 = raw_timestamp
            .trim()
            .parse()
            .map_err(|_| VerificationError::InvalidTimestamp)?;
        if now.abs_diff(timestamp) > TOLERANCE_SECS {
            return Err(VerificationError::TimestampOutOfTolerance);
        }

        let mac = self.mac(msg_id, raw_timestamp, raw_body)?;
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());

        if matched {
            Ok(())
        } else {
            Err(VerificationError::InvalidSignature)
        }
    }
}

impl VerifiedWebhookSource for SvixVerifier {
    type Event = ClerkEvent;

    fn verify(&self, raw_body: &[u8], headers: &HeaderMap) -> Result<ClerkEvent, VerificationError> {
        self.verify_at(raw_body, headers, unix_now())?;
        ClerkEvent::from_slice(raw_body)
    }
}

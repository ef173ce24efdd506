//! `X-Hub-Signature-256` verification.
//!
//! GitHub signs the raw request body with HMAC-SHA256 using the webhook
//! secret and sends `sha256=<lowercase hex>`. Verification must run on the
//! body bytes exactly as received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes the header value GitHub would send for `body`.
#[cfg(test)]
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Returns `true` only when `signature` matches the HMAC of `body`.
/// A missing header, a bad prefix, non-hex digits or any mismatch gives `false`.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(expected) = signature
        .and_then(|s| s.strip_prefix(SIGNATURE_PREFIX))
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
    else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

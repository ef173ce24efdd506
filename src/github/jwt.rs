use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::github::error::GithubError;
use crate::github::models::Claims;

/// Backdated to absorb clock drift between us and GitHub.
const CLOCK_SKEW_SECS: i64 = 60;
/// GitHub rejects app JWTs that live longer than ten minutes.
const LIFETIME_SECS: i64 = 9 * 60;

pub fn app_claims(app_id: &str, now: i64) -> Claims {
    Claims {
        iat: now - CLOCK_SKEW_SECS,
        exp: now + LIFETIME_SECS,
        iss: app_id.to_string(),
    }
}

/// Signs the RS256 app assertion that is exchanged for an installation token.
pub fn sign_app_assertion(app_id: &str, key: &EncodingKey, now: i64) -> Result<String, GithubError> {
    encode(&Header::new(Algorithm::RS256), &app_claims(app_id, now), key)
        .map_err(|e| GithubError::Jwt(format!("Failed to encode JWT: {e}")))
}

pub fn encoding_key_from_pem(pem: &str) -> Result<EncodingKey, GithubError> {
    EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| GithubError::Jwt(format!("Invalid RSA private key: {e}")))
}

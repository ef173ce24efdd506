use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::auth::{AuthError, IdentityProvider, Principal};

const SESSION_COOKIE: &str = "__session";

#[derive(Deserialize)]
struct SessionClaims {
    sub: String,
}

/// Verifies Clerk session JWTs offline against the instance's PEM public key.
pub struct ClerkSessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl ClerkSessionVerifier {
    pub fn new(public_key_pem: &str, issuer: Option<&str>) -> Result<Self, jsonwebtoken::errors::Error> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 5;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Ok(Self { key, validation })
    }

    pub fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(Principal {
            subject: data.claims.sub,
        })
    }
}

impl IdentityProvider for ClerkSessionVerifier {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)
            .or_else(|| session_cookie(headers))
            .ok_or(AuthError::MissingToken)?;
        self.verify_token(token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use thiserror::Error;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::store::User;
use crate::users;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no session token presented")]
    MissingToken,

    #[error("session token rejected: {0}")]
    InvalidToken(String),
}

/// The authenticated caller as asserted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
}

pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError>;
}

impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(state.identity.authenticate(&parts.headers)?)
    }
}

/// The local user record behind the current principal.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        let user = users::current_user(state.store.as_ref(), &principal).await?;
        Ok(CurrentUser(user))
    }
}

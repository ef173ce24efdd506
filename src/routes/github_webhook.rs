use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, error};

use crate::app_state::AppState;
use crate::webhooks::dispatch::{dispatch_github, Dispatch};
use crate::webhooks::VerificationError;

/// Accepts GitHub App deliveries. Anything correctly signed and recorded is
/// acknowledged with 202, even when the follow-up work fails.
pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    match dispatch_github(&state, &headers, &body).await {
        Ok(Dispatch::Accepted {
            delivery_id,
            recorded,
            action,
        }) => {
            debug!(%delivery_id, ?recorded, ?action, "Delivery accepted");
            StatusCode::ACCEPTED
        }
        Ok(Dispatch::Rejected(VerificationError::MissingHeader(_))) => StatusCode::BAD_REQUEST,
        Ok(Dispatch::Rejected(_)) => StatusCode::UNAUTHORIZED,
        Err(e) => {
            error!(error = %e, "Failed to record GitHub delivery");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, warn};

use crate::app_state::AppState;
use crate::clerk::ClerkEvent;
use crate::error::AppError;
use crate::users;

pub async fn users_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let event = state.user_webhooks.verify(&body, &headers).map_err(|e| {
        warn!(error = %e, "Rejected Clerk webhook");
        AppError::BadRequest(e.to_string())
    })?;

    let store = state.store.as_ref();
    match event {
        ClerkEvent::UserCreated(data) | ClerkEvent::UserUpdated(data) => {
            users::upsert_from_clerk(store, &data).await?;
        }
        ClerkEvent::UserDeleted(deleted) => match deleted.id {
            Some(id) => users::delete_from_clerk(store, &id).await?,
            None => warn!("user.deleted event without an id"),
        },
        ClerkEvent::Other { event_type } => {
            debug!(event = %event_type, "Ignoring Clerk event");
        }
    }

    Ok(StatusCode::OK)
}

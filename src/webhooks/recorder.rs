use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::store::{RecordOutcome, Store, StoreResult, WebhookDelivery};

/// Durably records a verified delivery, at most once per delivery id.
/// Callers must only get here after the signature has been checked.
pub async fn record(
    store: &dyn Store,
    delivery_id: &str,
    event_type: &str,
    payload: Value,
) -> StoreResult<RecordOutcome> {
    let outcome = store
        .insert_delivery_if_absent(WebhookDelivery {
            delivery_id: delivery_id.to_string(),
            event: event_type.to_string(),
            payload,
            handled_at: None,
        })
        .await?;

    if let RecordOutcome::Duplicate { handled } = outcome {
        debug!(delivery_id, handled, "Delivery already recorded");
    }
    Ok(outcome)
}

pub async fn mark_handled(store: &dyn Store, delivery_id: &str) -> StoreResult<()> {
    store.mark_delivery_handled(delivery_id, Utc::now()).await
}

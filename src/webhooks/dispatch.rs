//! GitHub delivery pipeline: verify, record, then act on the event.
//!
//! Once a delivery is recorded it is acknowledged no matter what happens
//! downstream. A failed reconciliation leaves `handled_at` unset so the
//! delivery can be replayed from the log later.

use axum::http::HeaderMap;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::app_state::AppState;
use crate::github::events::GithubEvent;
use crate::github::models::InstallationEvent;
use crate::store::{AccountType, InstallationUpsert, RecordOutcome, StoreError, WebhookDelivery};
use crate::sync::{reconcile, SyncError, SyncSummary};
use crate::webhooks::github::GithubDelivery;
use crate::webhooks::{recorder, VerificationError, VerifiedWebhookSource};

const REPLAY_CONCURRENCY: usize = 4;

#[derive(Debug)]
pub enum Dispatch {
    Rejected(VerificationError),
    Accepted {
        delivery_id: String,
        recorded: RecordOutcome,
        action: Action,
    },
}

#[derive(Debug, PartialEq)]
pub enum Action {
    AlreadyHandled,
    Ignored,
    Reconciled(SyncSummary),
    ReconcileFailed(String),
}

/// Runs one delivery through the pipeline. Only a failure to record the
/// delivery is returned as an error.
#[instrument(skip_all)]
pub async fn dispatch_github(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Dispatch, StoreError> {
    let GithubDelivery {
        delivery_id,
        event_type,
        payload,
        event,
    } = match state.github_webhooks.verify(body, headers) {
        Ok(delivery) => delivery,
        Err(e) => {
            warn!(error = %e, "Rejected GitHub delivery");
            return Ok(Dispatch::Rejected(e));
        }
    };

    let recorded = recorder::record(state.store.as_ref(), &delivery_id, &event_type, payload).await?;
    info!(%delivery_id, event = %event_type, ?recorded, "Recorded GitHub delivery");

    if recorded == (RecordOutcome::Duplicate { handled: true }) {
        return Ok(Dispatch::Accepted {
            delivery_id,
            recorded,
            action: Action::AlreadyHandled,
        });
    }

    let action = run_and_mark(state, &delivery_id, &event).await;
    Ok(Dispatch::Accepted {
        delivery_id,
        recorded,
        action,
    })
}

async fn run_and_mark(state: &AppState, delivery_id: &str, event: &GithubEvent) -> Action {
    let action = match handle_event(state, event).await {
        Ok(action) => action,
        Err(e) => {
            warn!(%delivery_id, error = %e, "Reconciliation failed; delivery left unhandled");
            return Action::ReconcileFailed(e.to_string());
        }
    };

    if let Err(e) = recorder::mark_handled(state.store.as_ref(), delivery_id).await {
        warn!(%delivery_id, error = %e, "Could not mark delivery handled");
    }
    action
}

async fn handle_event(state: &AppState, event: &GithubEvent) -> Result<Action, SyncError> {
    match event {
        GithubEvent::InstallationRepositories(ev) => {
            let summary = reconcile(state.store.as_ref(), &state.github, ev.installation.id).await?;
            Ok(Action::Reconciled(summary))
        }
        GithubEvent::Installation(ev) if ev.grants_access() => {
            let Some(account_type) = upsert_from_event(state, ev).await? else {
                return Ok(Action::Ignored);
            };
            debug!(installation_id = ev.installation.id, %account_type, "Installation access granted");
            let summary = reconcile(state.store.as_ref(), &state.github, ev.installation.id).await?;
            Ok(Action::Reconciled(summary))
        }
        GithubEvent::Installation(ev) => {
            info!(
                installation_id = ev.installation.id,
                action = %ev.action,
                "Installation event acknowledged"
            );
            Ok(Action::Ignored)
        }
        GithubEvent::Ping => Ok(Action::Ignored),
        GithubEvent::Unknown { event_type, .. } => {
            debug!(event = %event_type, "Ignoring GitHub event");
            Ok(Action::Ignored)
        }
    }
}

/// Upserts the installation named in an `installation` event, keeping
/// whoever connected it. Returns `None` for account types we don't model.
async fn upsert_from_event(
    state: &AppState,
    ev: &InstallationEvent,
) -> Result<Option<AccountType>, StoreError> {
    let account = &ev.installation.account;
    let Ok(account_type) = account.kind.parse::<AccountType>() else {
        warn!(
            installation_id = ev.installation.id,
            account_type = %account.kind,
            "Unsupported installation account type"
        );
        return Ok(None);
    };

    let connected_by_user_id = state
        .store
        .find_installation(ev.installation.id)
        .await?
        .and_then(|i| i.connected_by_user_id);

    state
        .store
        .upsert_installation(InstallationUpsert {
            installation_id: ev.installation.id,
            account_login: account.login.clone(),
            account_type,
            connected_by_user_id,
        })
        .await?;
    Ok(Some(account_type))
}

/// Re-dispatches recorded installation deliveries that never completed.
/// Returns how many were handled this time.
pub async fn replay_unhandled(state: &AppState) -> Result<usize, StoreError> {
    let pending: Vec<WebhookDelivery> = state
        .store
        .list_unhandled_deliveries()
        .await?
        .into_iter()
        .filter(|d| GithubEvent::is_sync_event_type(&d.event))
        .collect();

    info!(pending = pending.len(), "Replaying unhandled deliveries");

    let handled = stream::iter(pending)
        .map(|delivery| async move {
            let event = GithubEvent::parse(&delivery.event, &delivery.payload);
            run_and_mark(state, &delivery.delivery_id, &event).await
        })
        .buffer_unordered(REPLAY_CONCURRENCY)
        .filter(|action| futures::future::ready(!matches!(action, Action::ReconcileFailed(_))))
        .count()
        .await;

    Ok(handled)
}

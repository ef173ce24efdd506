//! Typed view over inbound GitHub webhook payloads.
//!
//! Only the events that drive installation state are narrowed. Everything
//! else, including known event types whose payload fails to deserialize,
//! falls into [`GithubEvent::Unknown`] with the raw document preserved.

use serde_json::Value;

use crate::github::models::{InstallationEvent, InstallationRepositoriesEvent};

pub const INSTALLATION_REPOSITORIES: &str = "installation_repositories";
pub const INSTALLATION: &str = "installation";
pub const PING: &str = "ping";

/// `installation` actions after which the app has (new) access to repositories.
const ACCESS_GRANTED_ACTIONS: &[&str] = &["created", "new_permissions_accepted", "unsuspend"];

#[derive(Debug)]
pub enum GithubEvent {
    InstallationRepositories(InstallationRepositoriesEvent),
    Installation(InstallationEvent),
    Ping,
    Unknown { event_type: String, raw: Value },
}

impl GithubEvent {
    pub fn parse(event_type: &str, payload: &Value) -> Self {
        let narrowed = match event_type {
            INSTALLATION_REPOSITORIES => serde_json::from_value(payload.clone())
                .ok()
                .map(GithubEvent::InstallationRepositories),
            INSTALLATION => serde_json::from_value(payload.clone())
                .ok()
                .map(GithubEvent::Installation),
            PING => Some(GithubEvent::Ping),
            _ => None,
        };

        narrowed.unwrap_or_else(|| GithubEvent::Unknown {
            event_type: event_type.to_string(),
            raw: payload.clone(),
        })
    }

    /// Whether a delivery of this type may need reconciliation on replay.
    pub fn is_sync_event_type(event_type: &str) -> bool {
        matches!(event_type, INSTALLATION_REPOSITORIES | INSTALLATION)
    }
}

impl InstallationEvent {
    pub fn grants_access(&self) -> bool {
        ACCESS_GRANTED_ACTIONS.contains(&self.action.as_str())
    }
}

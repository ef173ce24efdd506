//! Persistence boundary.
//!
//! Records are keyed by their external identifiers: deliveries by
//! `delivery_id`, installations by `installation_id`, repos by
//! `(owner, name)` and users by `external_id`. The merge rules for each
//! upsert live on the record types so every backend applies them the same way.

pub mod memory;
pub mod supabase;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

pub const PROVIDER_GITHUB: &str = "github";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),

    #[error("store returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("could not decode store response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub delivery_id: String,
    pub event: String,
    pub payload: Value,
    #[serde(default)]
    pub handled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    Duplicate { handled: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    User,
    Organization,
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(AccountType::User),
            "Organization" => Ok(AccountType::Organization),
            other => Err(format!("unknown account type {other:?}")),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::User => f.write_str("User"),
            AccountType::Organization => f.write_str("Organization"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    pub id: String,
    pub provider: String,
    pub installation_id: i64,
    pub account_login: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub connected_by_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallationUpsert {
    pub installation_id: i64,
    pub account_login: String,
    pub account_type: AccountType,
    pub connected_by_user_id: Option<String>,
}

impl Installation {
    /// GitHub is authoritative: mutable fields are overwritten wholesale.
    pub fn apply(existing: Option<Installation>, input: InstallationUpsert) -> Installation {
        let id = existing.map(|i| i.id).unwrap_or_else(new_id);
        Installation {
            id,
            provider: PROVIDER_GITHUB.to_string(),
            installation_id: input.installation_id,
            account_login: input.account_login,
            account_type: input.account_type,
            connected_by_user_id: input.connected_by_user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub id: String,
    pub provider: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub installation_id: i64,
    #[serde(default)]
    pub connected_by_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInput {
    pub owner: String,
    pub name: String,
    #[serde(default, rename = "defaultBranch", alias = "default_branch")]
    pub default_branch: Option<String>,
}

impl Repo {
    /// Absent incoming values fall back to what is stored. The installation
    /// is always overwritten since repositories can move between installations.
    pub fn apply(
        existing: Option<Repo>,
        installation_id: i64,
        input: &RepoInput,
        connected_by_user_id: Option<&str>,
    ) -> Repo {
        let connected_by_user_id = connected_by_user_id.map(str::to_string);
        match existing {
            Some(existing) => Repo {
                default_branch: input.default_branch.clone().or(existing.default_branch),
                installation_id,
                connected_by_user_id: connected_by_user_id.or(existing.connected_by_user_id),
                ..existing
            },
            None => Repo {
                id: new_id(),
                provider: PROVIDER_GITHUB.to_string(),
                owner: input.owner.clone(),
                name: input.name.clone(),
                default_branch: input.default_branch.clone(),
                installation_id,
                connected_by_user_id,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub github_id: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub github_avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserAttributes {
    pub external_id: String,
    pub name: String,
    pub email: Option<String>,
    pub github_id: Option<String>,
    pub github_username: Option<String>,
    pub github_avatar_url: Option<String>,
}

impl User {
    pub fn apply(existing: Option<User>, attrs: UserAttributes) -> User {
        User {
            id: existing.map(|u| u.id).unwrap_or_else(new_id),
            external_id: attrs.external_id,
            name: attrs.name,
            email: attrs.email,
            github_id: attrs.github_id,
            github_username: attrs.github_username,
            github_avatar_url: attrs.github_avatar_url,
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_delivery(&self, delivery_id: &str) -> StoreResult<Option<WebhookDelivery>>;

    /// Inserts the delivery unless one with the same id already exists.
    /// The first write wins; later payloads are discarded.
    async fn insert_delivery_if_absent(&self, delivery: WebhookDelivery) -> StoreResult<RecordOutcome>;

    async fn mark_delivery_handled(&self, delivery_id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    async fn list_unhandled_deliveries(&self) -> StoreResult<Vec<WebhookDelivery>>;

    async fn find_installation(&self, installation_id: i64) -> StoreResult<Option<Installation>>;

    async fn upsert_installation(&self, input: InstallationUpsert) -> StoreResult<Installation>;

    async fn list_installations_connected_by(&self, user_id: &str) -> StoreResult<Vec<Installation>>;

    /// Returns the number of repos written.
    async fn upsert_repos_for_installation(
        &self,
        installation_id: i64,
        repos: &[RepoInput],
        connected_by_user_id: Option<&str>,
    ) -> StoreResult<usize>;

    async fn find_repo(&self, owner: &str, name: &str) -> StoreResult<Option<Repo>>;

    async fn list_repos_for_installation(&self, installation_id: i64) -> StoreResult<Vec<Repo>>;

    async fn find_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>>;

    async fn upsert_user(&self, attrs: UserAttributes) -> StoreResult<User>;

    /// Returns `false` when no user had that external id.
    async fn delete_user_by_external_id(&self, external_id: &str) -> StoreResult<bool>;
}

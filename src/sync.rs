//! Installation reconciliation: bring stored repos in line with what GitHub
//! says the installation can access.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::github::{GithubApp, GithubError};
use crate::store::{RepoInput, Store, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub synced: usize,
}

/// Fetches the installation's repositories and upserts them. Errors are not
/// retried here; callers decide whether to try again.
#[instrument(skip(store, github))]
pub async fn reconcile(
    store: &dyn Store,
    github: &GithubApp,
    installation_id: i64,
) -> Result<SyncSummary, SyncError> {
    let token = github.installation_token(installation_id).await?;
    let repositories = github.list_installation_repositories(&token).await?;

    let repos: Vec<RepoInput> = repositories
        .into_iter()
        .map(|r| RepoInput {
            owner: r.owner.login,
            name: r.name,
            default_branch: r.default_branch,
        })
        .collect();

    let connected_by = store
        .find_installation(installation_id)
        .await?
        .and_then(|i| i.connected_by_user_id);

    let synced = store
        .upsert_repos_for_installation(installation_id, &repos, connected_by.as_deref())
        .await?;

    info!(installation_id, synced, "Reconciled installation repositories");
    Ok(SyncSummary { synced })
}

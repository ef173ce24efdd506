use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::store::{AccountType, Installation, InstallationUpsert, Repo, RepoInput, Store, User};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInstallation {
    pub installation_id: i64,
    pub account_login: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub repos: Vec<RepoInput>,
}

/// Records an installation the current user just approved, together with any
/// repositories the client already knows about. The user becomes the
/// connector of both.
pub async fn record_from_github(
    store: &dyn Store,
    user: &User,
    request: RecordInstallation,
) -> Result<Installation, AppError> {
    if request.account_login.trim().is_empty() {
        return Err(AppError::BadRequest("accountLogin must not be empty".to_string()));
    }

    let installation = store
        .upsert_installation(InstallationUpsert {
            installation_id: request.installation_id,
            account_login: request.account_login,
            account_type: request.account_type,
            connected_by_user_id: Some(user.id.clone()),
        })
        .await?;

    store
        .upsert_repos_for_installation(request.installation_id, &request.repos, Some(&user.id))
        .await?;

    info!(
        installation_id = installation.installation_id,
        user_id = %user.id,
        repos = request.repos.len(),
        "Recorded installation"
    );
    Ok(installation)
}

pub async fn list_my_installations(store: &dyn Store, user: &User) -> Result<Vec<Installation>, AppError> {
    Ok(store.list_installations_connected_by(&user.id).await?)
}

/// Only the user who connected an installation may look at or act on it.
pub async fn authorize(
    store: &dyn Store,
    user: &User,
    installation_id: i64,
) -> Result<Installation, AppError> {
    match store.find_installation(installation_id).await? {
        Some(install) if install.connected_by_user_id.as_deref() == Some(user.id.as_str()) => Ok(install),
        _ => Err(AppError::Forbidden(
            "Not authorized to view this installation".to_string(),
        )),
    }
}

pub async fn list_repos_for_installation(
    store: &dyn Store,
    user: &User,
    installation_id: i64,
) -> Result<Vec<Repo>, AppError> {
    authorize(store, user, installation_id).await?;
    Ok(store.list_repos_for_installation(installation_id).await?)
}

use tracing::{info, warn};

use crate::auth::Principal;
use crate::clerk::models::UserJson;
use crate::error::AppError;
use crate::store::{Store, StoreResult, User, UserAttributes};

pub fn attributes_from_clerk(data: &UserJson) -> UserAttributes {
    let github = data.github_account();
    UserAttributes {
        external_id: data.id.clone(),
        name: data.display_name(),
        email: data.primary_email(),
        github_id: github.and_then(|a| a.provider_user_id_string()),
        github_username: github.and_then(|a| a.username.clone()),
        github_avatar_url: github.and_then(|a| a.image_url.clone()),
    }
}

pub async fn upsert_from_clerk(store: &dyn Store, data: &UserJson) -> StoreResult<User> {
    let user = store.upsert_user(attributes_from_clerk(data)).await?;
    info!(external_id = %user.external_id, "Upserted user from Clerk");
    Ok(user)
}

pub async fn delete_from_clerk(store: &dyn Store, clerk_user_id: &str) -> StoreResult<()> {
    if !store.delete_user_by_external_id(clerk_user_id).await? {
        warn!(
            clerk_user_id,
            "Can't delete user, there is none for this Clerk user ID"
        );
    }
    Ok(())
}

pub async fn current_user(store: &dyn Store, principal: &Principal) -> Result<User, AppError> {
    store
        .find_user_by_external_id(&principal.subject)
        .await?
        .ok_or(AppError::Unauthenticated)
}

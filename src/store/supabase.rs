use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgrest::{Builder, Postgrest};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::{
    Installation, InstallationUpsert, RecordOutcome, Repo, RepoInput, Store, StoreError,
    StoreResult, User, UserAttributes, WebhookDelivery,
};

const DELIVERIES: &str = "github_events";
const INSTALLATIONS: &str = "installations";
const REPOS: &str = "repos";
const USERS: &str = "users";

const HTTP_CONFLICT: u16 = 409;

/// Store backed by Supabase's PostgREST API.
///
/// Expects unique constraints on `github_events.delivery_id`,
/// `installations.installation_id`, `repos(owner, name)` and
/// `users.external_id`. The delivery constraint is what keeps two racing
/// redeliveries from both inserting.
pub struct SupabaseStore {
    client: Postgrest,
}

/// Status and body of a PostgREST response, read eagerly.
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn ok(self) -> StoreResult<String> {
        if (200..300).contains(&self.status) {
            Ok(self.body)
        } else {
            Err(StoreError::Backend {
                status: self.status,
                body: self.body,
            })
        }
    }

    fn rows<T: DeserializeOwned>(self) -> StoreResult<Vec<T>> {
        Ok(serde_json::from_str(&self.ok()?)?)
    }

    fn first<T: DeserializeOwned>(self) -> StoreResult<Option<T>> {
        Ok(self.rows::<T>()?.into_iter().next())
    }
}

async fn send(builder: Builder) -> StoreResult<Reply> {
    let res = builder
        .execute()
        .await
        .map_err(|e| StoreError::Request(e.to_string()))?;
    let status = res.status().as_u16();
    let body = res
        .text()
        .await
        .map_err(|e| StoreError::Request(e.to_string()))?;
    Ok(Reply { status, body })
}

impl SupabaseStore {
    pub fn new(url: &str, api_key: &str) -> Self {
        let client = Postgrest::new(url)
            .insert_header("apikey", api_key)
            .insert_header("Authorization", format!("Bearer {}", api_key));
        Self { client }
    }

    /// Inserts one row. Returns `false` when a unique constraint rejected it
    /// because a concurrent writer got there first.
    async fn try_insert<T: Serialize>(&self, table: &str, row: &T) -> StoreResult<bool> {
        let body = serde_json::to_string(&[row])?;
        let reply = send(self.client.from(table).insert(body)).await?;
        if reply.status == HTTP_CONFLICT {
            debug!(table, "Row inserted concurrently, updating instead");
            return Ok(false);
        }
        reply.ok()?;
        Ok(true)
    }

    async fn update_installation(&self, installation: &Installation) -> StoreResult<()> {
        let patch = json!({
            "account_login": installation.account_login,
            "account_type": installation.account_type,
            "connected_by_user_id": installation.connected_by_user_id,
        });
        let query = self
            .client
            .from(INSTALLATIONS)
            .eq("installation_id", installation.installation_id.to_string())
            .update(patch.to_string());
        send(query).await?.ok()?;
        Ok(())
    }

    async fn update_repo(&self, repo: &Repo) -> StoreResult<()> {
        let patch = json!({
            "default_branch": repo.default_branch,
            "installation_id": repo.installation_id,
            "connected_by_user_id": repo.connected_by_user_id,
        });
        let query = self
            .client
            .from(REPOS)
            .eq("owner", &repo.owner)
            .eq("name", &repo.name)
            .update(patch.to_string());
        send(query).await?.ok()?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let patch = json!({
            "name": user.name,
            "email": user.email,
            "github_id": user.github_id,
            "github_username": user.github_username,
            "github_avatar_url": user.github_avatar_url,
        });
        let query = self
            .client
            .from(USERS)
            .eq("external_id", &user.external_id)
            .update(patch.to_string());
        send(query).await?.ok()?;
        Ok(())
    }

    async fn upsert_repo(
        &self,
        installation_id: i64,
        input: &RepoInput,
        connected_by_user_id: Option<&str>,
    ) -> StoreResult<()> {
        if let Some(existing) = self.find_repo(&input.owner, &input.name).await? {
            let repo = Repo::apply(Some(existing), installation_id, input, connected_by_user_id);
            return self.update_repo(&repo).await;
        }

        let repo = Repo::apply(None, installation_id, input, connected_by_user_id);
        if self.try_insert(REPOS, &repo).await? {
            return Ok(());
        }
        // Merge against the row that won.
        let existing = self.find_repo(&input.owner, &input.name).await?;
        let repo = Repo::apply(existing, installation_id, input, connected_by_user_id);
        self.update_repo(&repo).await
    }
}

#[async_trait]
impl Store for SupabaseStore {
    async fn find_delivery(&self, delivery_id: &str) -> StoreResult<Option<WebhookDelivery>> {
        let query = self
            .client
            .from(DELIVERIES)
            .select("*")
            .eq("delivery_id", delivery_id)
            .limit(1);
        send(query).await?.first()
    }

    async fn insert_delivery_if_absent(&self, delivery: WebhookDelivery) -> StoreResult<RecordOutcome> {
        if let Some(existing) = self.find_delivery(&delivery.delivery_id).await? {
            return Ok(RecordOutcome::Duplicate {
                handled: existing.handled_at.is_some(),
            });
        }

        let body = serde_json::to_string(&[&delivery])?;
        let reply = send(self.client.from(DELIVERIES).insert(body)).await?;

        if reply.status == HTTP_CONFLICT {
            // Lost the race to a concurrent redelivery.
            debug!(delivery_id = %delivery.delivery_id, "Delivery inserted concurrently");
            let handled = self
                .find_delivery(&delivery.delivery_id)
                .await?
                .is_some_and(|d| d.handled_at.is_some());
            return Ok(RecordOutcome::Duplicate { handled });
        }
        reply.ok()?;
        Ok(RecordOutcome::Inserted)
    }

    async fn mark_delivery_handled(&self, delivery_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let query = self
            .client
            .from(DELIVERIES)
            .eq("delivery_id", delivery_id)
            .update(json!({ "handled_at": at }).to_string());
        send(query).await?.ok()?;
        Ok(())
    }

    async fn list_unhandled_deliveries(&self) -> StoreResult<Vec<WebhookDelivery>> {
        let query = self
            .client
            .from(DELIVERIES)
            .select("*")
            .is("handled_at", "null");
        send(query).await?.rows()
    }

    async fn find_installation(&self, installation_id: i64) -> StoreResult<Option<Installation>> {
        let query = self
            .client
            .from(INSTALLATIONS)
            .select("*")
            .eq("installation_id", installation_id.to_string())
            .limit(1);
        send(query).await?.first()
    }

    async fn upsert_installation(&self, input: InstallationUpsert) -> StoreResult<Installation> {
        if let Some(existing) = self.find_installation(input.installation_id).await? {
            let installation = Installation::apply(Some(existing), input);
            self.update_installation(&installation).await?;
            return Ok(installation);
        }

        let installation = Installation::apply(None, input.clone());
        if self.try_insert(INSTALLATIONS, &installation).await? {
            return Ok(installation);
        }
        let existing = self.find_installation(input.installation_id).await?;
        let installation = Installation::apply(existing, input);
        self.update_installation(&installation).await?;
        Ok(installation)
    }

    async fn list_installations_connected_by(&self, user_id: &str) -> StoreResult<Vec<Installation>> {
        let query = self
            .client
            .from(INSTALLATIONS)
            .select("*")
            .eq("connected_by_user_id", user_id)
            .order("installation_id.asc");
        send(query).await?.rows()
    }

    async fn upsert_repos_for_installation(
        &self,
        installation_id: i64,
        repos: &[RepoInput],
        connected_by_user_id: Option<&str>,
    ) -> StoreResult<usize> {
        for input in repos {
            self.upsert_repo(installation_id, input, connected_by_user_id).await?;
        }
        Ok(repos.len())
    }

    async fn find_repo(&self, owner: &str, name: &str) -> StoreResult<Option<Repo>> {
        let query = self
            .client
            .from(REPOS)
            .select("*")
            .eq("owner", owner)
            .eq("name", name)
            .limit(1);
        send(query).await?.first()
    }

    async fn list_repos_for_installation(&self, installation_id: i64) -> StoreResult<Vec<Repo>> {
        let query = self
            .client
            .from(REPOS)
            .select("*")
            .eq("installation_id", installation_id.to_string())
            .order("owner.asc,name.asc");
        send(query).await?.rows()
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let query = self
            .client
            .from(USERS)
            .select("*")
            .eq("external_id", external_id)
            .limit(1);
        send(query).await?.first()
    }

    async fn upsert_user(&self, attrs: UserAttributes) -> StoreResult<User> {
        if let Some(existing) = self.find_user_by_external_id(&attrs.external_id).await? {
            let user = User::apply(Some(existing), attrs);
            self.update_user(&user).await?;
            return Ok(user);
        }

        let user = User::apply(None, attrs.clone());
        if self.try_insert(USERS, &user).await? {
            return Ok(user);
        }
        let existing = self.find_user_by_external_id(&attrs.external_id).await?;
        let user = User::apply(existing, attrs);
        self.update_user(&user).await?;
        Ok(user)
    }

    async fn delete_user_by_external_id(&self, external_id: &str) -> StoreResult<bool> {
        if self.find_user_by_external_id(external_id).await?.is_none() {
            return Ok(false);
        }
        let query = self
            .client
            .from(USERS)
            .eq("external_id", external_id)
            .delete();
        send(query).await?.ok()?;
        Ok(true)
    }
}

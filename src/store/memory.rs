use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    Installation, InstallationUpsert, RecordOutcome, Repo, RepoInput, Store, StoreResult, User,
    UserAttributes, WebhookDelivery,
};

#[derive(Default)]
struct Tables {
    deliveries: HashMap<String, WebhookDelivery>,
    installations: HashMap<i64, Installation>,
    repos: HashMap<(String, String), Repo>,
    users: HashMap<String, User>,
}

/// Process-local store. Each operation runs under a single lock, so
/// lookup-then-insert cannot race.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves the maps intact.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn delivery_count(&self) -> usize {
        self.tables().deliveries.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_delivery(&self, delivery_id: &str) -> StoreResult<Option<WebhookDelivery>> {
        Ok(self.tables().deliveries.get(delivery_id).cloned())
    }

    async fn insert_delivery_if_absent(&self, delivery: WebhookDelivery) -> StoreResult<RecordOutcome> {
        let mut tables = self.tables();
        if let Some(existing) = tables.deliveries.get(&delivery.delivery_id) {
            return Ok(RecordOutcome::Duplicate {
                handled: existing.handled_at.is_some(),
            });
        }
        tables.deliveries.insert(delivery.delivery_id.clone(), delivery);
        Ok(RecordOutcome::Inserted)
    }

    async fn mark_delivery_handled(&self, delivery_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(delivery) = self.tables().deliveries.get_mut(delivery_id) {
            delivery.handled_at = Some(at);
        }
        Ok(())
    }

    async fn list_unhandled_deliveries(&self) -> StoreResult<Vec<WebhookDelivery>> {
        Ok(self
            .tables()
            .deliveries
            .values()
            .filter(|d| d.handled_at.is_none())
            .cloned()
            .collect())
    }

    async fn find_installation(&self, installation_id: i64) -> StoreResult<Option<Installation>> {
        Ok(self.tables().installations.get(&installation_id).cloned())
    }

    async fn upsert_installation(&self, input: InstallationUpsert) -> StoreResult<Installation> {
        let mut tables = self.tables();
        let existing = tables.installations.remove(&input.installation_id);
        let installation = Installation::apply(existing, input);
        tables
            .installations
            .insert(installation.installation_id, installation.clone());
        Ok(installation)
    }

    async fn list_installations_connected_by(&self, user_id: &str) -> StoreResult<Vec<Installation>> {
        let mut installs: Vec<_> = self
            .tables()
            .installations
            .values()
            .filter(|i| i.connected_by_user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        installs.sort_by_key(|i| i.installation_id);
        Ok(installs)
    }

    async fn upsert_repos_for_installation(
        &self,
        installation_id: i64,
        repos: &[RepoInput],
        connected_by_user_id: Option<&str>,
    ) -> StoreResult<usize> {
        let mut tables = self.tables();
        for input in repos {
            let key = (input.owner.clone(), input.name.clone());
            let existing = tables.repos.remove(&key);
            let repo = Repo::apply(existing, installation_id, input, connected_by_user_id);
            tables.repos.insert(key, repo);
        }
        Ok(repos.len())
    }

    async fn find_repo(&self, owner: &str, name: &str) -> StoreResult<Option<Repo>> {
        Ok(self
            .tables()
            .repos
            .get(&(owner.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_repos_for_installation(&self, installation_id: i64) -> StoreResult<Vec<Repo>> {
        let mut repos: Vec<_> = self
            .tables()
            .repos
            .values()
            .filter(|r| r.installation_id == installation_id)
            .cloned()
            .collect();
        repos.sort_by(|a, b| (&a.owner, &a.name).cmp(&(&b.owner, &b.name)));
        Ok(repos)
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        Ok(self.tables().users.get(external_id).cloned())
    }

    async fn upsert_user(&self, attrs: UserAttributes) -> StoreResult<User> {
        let mut tables = self.tables();
        let existing = tables.users.remove(&attrs.external_id);
        let user = User::apply(existing, attrs);
        tables.users.insert(user.external_id.clone(), user.clone());
        Ok(user)
    }

    async fn delete_user_by_external_id(&self, external_id: &str) -> StoreResult<bool> {
        Ok(self.tables().users.remove(external_id).is_some())
    }
}

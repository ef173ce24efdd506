use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::IdentityProvider;
use crate::clerk::{ClerkEvent, ClerkSessionVerifier};
use crate::config::Config;
use crate::github::GithubApp;
use crate::store::{MemoryStore, Store, SupabaseStore};
use crate::webhooks::github::GithubWebhookSource;
use crate::webhooks::svix::SvixVerifier;
use crate::webhooks::VerifiedWebhookSource;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub github: GithubApp,
    pub github_webhooks: GithubWebhookSource,
    pub user_webhooks: Arc<dyn VerifiedWebhookSource<Event = ClerkEvent>>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub fn build_app_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let store: Arc<dyn Store> = match &config.supabase {
        Some(supabase) => {
            info!(url = %supabase.url, "Using Supabase store");
            Arc::new(SupabaseStore::new(&supabase.url, &supabase.api_key))
        }
        None => {
            warn!("SUPABASE_URL not set, records are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(AppState {
        store,
        github: GithubApp::from_config(config)?,
        github_webhooks: GithubWebhookSource::new(config.github_webhook_secret.clone()),
        user_webhooks: Arc::new(SvixVerifier::new(&config.clerk_webhook_secret)?),
        identity: Arc::new(ClerkSessionVerifier::new(
            &config.clerk_jwt_key_pem,
            config.clerk_issuer.as_deref(),
        )?),
    })
}

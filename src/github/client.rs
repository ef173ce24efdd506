use jsonwebtoken::EncodingKey;
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::{Config, USER_AGENT};
use crate::github::error::GithubError;
use crate::github::jwt::{encoding_key_from_pem, sign_app_assertion};
use crate::github::models::{AccessTokenResponse, Repository, RepositoryPage};
use crate::utils::unix_now;

const PER_PAGE: usize = 100;

/// Authenticates as the GitHub App and talks to the REST API on behalf of
/// an installation.
pub struct GithubApp {
    client: Client,
    api_url: String,
    app_id: String,
    encoding_key: EncodingKey,
}

impl GithubApp {
    pub fn from_config(config: &Config) -> Result<Self, GithubError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::new(
            client,
            &config.github_api_url,
            &config.github_app_id,
            encoding_key_from_pem(&config.github_private_key_pem)?,
        ))
    }

    pub fn new(client: Client, api_url: &str, app_id: &str, encoding_key: EncodingKey) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            encoding_key,
        }
    }

    /// Exchanges a freshly signed app assertion for an installation token.
    /// The token is short-lived and deliberately not cached.
    pub async fn installation_token(&self, installation_id: i64) -> Result<String, GithubError> {
        let jwt = sign_app_assertion(&self.app_id, &self.encoding_key, unix_now())?;

        let res = self
            .client
            .post(format!(
                "{}/app/installations/{}/access_tokens",
                self.api_url, installation_id
            ))
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let res = ensure_success(res, "Failed to fetch installation token").await?;
        let body: AccessTokenResponse = res
            .json()
            .await
            .map_err(|e| GithubError::InvalidResponse(format!("access token: {e}")))?;

        debug!(installation_id, "Obtained installation token");
        Ok(body.token)
    }

    /// Lists every repository the installation can access, following pages
    /// until `total_count` is reached or GitHub returns a short page.
    pub async fn list_installation_repositories(
        &self,
        token: &str,
    ) -> Result<Vec<Repository>, GithubError> {
        let mut repositories = Vec::new();
        let mut page = 1usize;

        loop {
            let res = self
                .client
                .get(format!("{}/installation/repositories", self.api_url))
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .bearer_auth(token)
                .header("Accept", "application/vnd.github+json")
                .send()
                .await?;

            let res = ensure_success(res, "Failed to list repositories").await?;
            let body: RepositoryPage = res
                .json()
                .await
                .map_err(|e| GithubError::InvalidResponse(format!("repository listing: {e}")))?;

            let received = body.repositories.len();
            repositories.extend(body.repositories);
            debug!(page, received, total = ?body.total_count, "Fetched repository page");

            let reached_total = body
                .total_count
                .is_some_and(|total| repositories.len() as u64 >= total);
            if received < PER_PAGE || reached_total {
                break;
            }
            page += 1;
        }

        Ok(repositories)
    }
}

async fn ensure_success(res: Response, context: &'static str) -> Result<Response, GithubError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(GithubError::Upstream {
        context,
        status: status.as_u16(),
        body,
    })
}

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const USER_AGENT: &str = "gh-install-sync";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
}

/// Process configuration, read once at startup and handed to every component.
#[derive(Clone)]
pub struct Config {
    pub github_webhook_secret: String,
    pub github_app_id: String,
    pub github_private_key_pem: String,
    pub github_api_url: String,
    pub clerk_webhook_secret: String,
    pub clerk_jwt_key_pem: String,
    pub clerk_issuer: Option<String>,
    pub http_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub supabase: Option<SupabaseConfig>,
    pub replay_on_start: bool,
    pub tokio_console: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[cfg(test)]
    pub fn from_map(vars: &std::collections::HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty strings count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let github_private_key_pem = match (get("GITHUB_PRIVATE_KEY"), get("GITHUB_PRIVATE_KEY_PATH")) {
            (Some(inline), _) => normalize_pem(&inline),
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Io { path, source })?,
            (None, None) => return Err(ConfigError::Missing("GITHUB_PRIVATE_KEY")),
        };

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|e| ConfigError::Invalid {
                    key: "HTTP_TIMEOUT_SECS",
                    reason: format!("{e}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        key: "HTTP_TIMEOUT_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: format!("{e}"),
            })?;

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_API_KEY")) {
            (Some(url), Some(api_key)) => Some(SupabaseConfig { url, api_key }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_API_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
        };

        Ok(Config {
            github_webhook_secret: require("GITHUB_WEBHOOK_SECRET")?,
            github_app_id: require("GITHUB_APP_ID")?,
            github_private_key_pem,
            github_api_url: get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            clerk_webhook_secret: require("CLERK_WEBHOOK_SECRET")?,
            clerk_jwt_key_pem: normalize_pem(&require("CLERK_JWT_KEY")?),
            clerk_issuer: get("CLERK_FRONTEND_API_URL"),
            http_timeout,
            bind_addr,
            supabase,
            replay_on_start: parse_flag(get("REPLAY_ON_START")),
            tokio_console: parse_flag(get("TOKIO_CONSOLE")),
        })
    }
}

/// Hosting dashboards often store PEM keys on a single line with literal `\n`.
fn normalize_pem(raw: &str) -> String {
    raw.trim().replace("\\n", "\n")
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}

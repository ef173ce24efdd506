//! Fixtures shared by the unit tests.

use std::sync::{Arc, OnceLock};

use axum::http::{HeaderMap, HeaderValue};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::app_state::AppState;
use crate::clerk::ClerkSessionVerifier;
use crate::github::jwt::encoding_key_from_pem;
use crate::github::GithubApp;
use crate::store::Store;
use crate::utils::unix_now;
use crate::webhooks::github::{GithubWebhookSource, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use crate::webhooks::svix::SvixVerifier;

pub const TEST_NOW: i64 = 1_700_000_000;
pub const TEST_WEBHOOK_SECRET: &str = "webhook-secret";
// base64("test-signing-key")
pub const TEST_SVIX_SECRET: &str = "whsec_dGVzdC1zaWduaW5nLWtleQ==";
pub const TEST_ISSUER: &str = "https://clerk.test";
pub const TEST_INSTALLATION_TOKEN: &str = "ghs_test";

pub struct TestKeys {
    pub private_pem: String,
    pub public_pem: String,
}

/// One 2048-bit key pair per test binary; generation is slow.
pub fn test_rsa_keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let private_pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .expect("Failed to convert private key to PEM")
            .to_string();
        let public_pem = private_key
            .to_public_key()
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .expect("Failed to convert public key to PEM");
        TestKeys {
            private_pem,
            public_pem,
        }
    })
}

pub fn github_app_for(api_url: &str) -> GithubApp {
    let key = encoding_key_from_pem(&test_rsa_keys().private_pem).unwrap();
    GithubApp::new(Client::new(), api_url, "4242", key)
}

pub fn repo_json(owner: &str, name: &str, default_branch: Option<&str>) -> Value {
    json!({
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "default_branch": default_branch,
        "owner": { "login": owner, "type": "Organization" }
    })
}

/// Mounts a token exchange for `installation_id` and a single page listing
/// `repos`.
pub async fn mock_github_installation(server: &MockServer, installation_id: i64, repos: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path(format!("/app/installations/{installation_id}/access_tokens")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": TEST_INSTALLATION_TOKEN,
            "expires_at": "2030-01-01T00:00:00Z"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/installation/repositories"))
        .and(header("authorization", format!("Bearer {TEST_INSTALLATION_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": repos.len(),
            "repositories": repos
        })))
        .mount(server)
        .await;
}

/// A Clerk-style session JWT for `sub`, expiring `ttl_secs` from now.
pub fn session_token(sub: &str, issuer: &str, ttl_secs: i64) -> String {
    let now = unix_now();
    let claims = json!({
        "sub": sub,
        "iss": issuer,
        "iat": now,
        "nbf": now,
        "exp": now + ttl_secs,
    });
    let key = EncodingKey::from_rsa_pem(test_rsa_keys().private_pem.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
}

pub fn github_headers(signature: &str, delivery_id: &str, event: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
    headers.insert(DELIVERY_HEADER, HeaderValue::from_str(delivery_id).unwrap());
    headers.insert(EVENT_HEADER, HeaderValue::from_str(event).unwrap());
    headers
}

pub fn test_state(store: Arc<dyn Store>, github_api_url: &str) -> AppState {
    AppState {
        store,
        github: github_app_for(github_api_url),
        github_webhooks: GithubWebhookSource::new(TEST_WEBHOOK_SECRET),
        user_webhooks: Arc::new(SvixVerifier::new(TEST_SVIX_SECRET).unwrap()),
        identity: Arc::new(
            ClerkSessionVerifier::new(&test_rsa_keys().public_pem, Some(TEST_ISSUER)).unwrap(),
        ),
    }
}

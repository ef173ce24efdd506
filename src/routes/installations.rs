use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::installations::{self, RecordInstallation};
use crate::store::{AccountType, Installation, Repo, User};
use crate::sync::{reconcile, SyncSummary};

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub async fn list_installations(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Installation>>, AppError> {
    let installs = installations::list_my_installations(state.store.as_ref(), &user).await?;
    Ok(Json(installs))
}

pub async fn list_repos(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(installation_id): Path<i64>,
) -> Result<Json<Vec<Repo>>, AppError> {
    let repos =
        installations::list_repos_for_installation(state.store.as_ref(), &user, installation_id).await?;
    Ok(Json(repos))
}

pub async fn create_installation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<RecordInstallation>,
) -> Result<(StatusCode, Json<Installation>), AppError> {
    let install = installations::record_from_github(state.store.as_ref(), &user, request).await?;
    Ok((StatusCode::CREATED, Json(install)))
}

pub async fn sync_installation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(installation_id): Path<i64>,
) -> Result<Json<SyncSummary>, AppError> {
    installations::authorize(state.store.as_ref(), &user, installation_id).await?;
    let summary = reconcile(state.store.as_ref(), &state.github, installation_id).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct InstallCallback {
    installation_id: Option<i64>,
    account_login: Option<String>,
    account_type: Option<AccountType>,
}

/// Where GitHub sends the browser after the app is installed.
pub async fn install_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InstallCallback>,
    user: Result<CurrentUser, AppError>,
) -> Result<Redirect, AppError> {
    let Ok(CurrentUser(user)) = user else {
        return Ok(Redirect::to("/"));
    };

    let (Some(installation_id), Some(account_login)) = (params.installation_id, params.account_login)
    else {
        return Err(AppError::BadRequest(
            "installation_id and account_login are required".to_string(),
        ));
    };
    let account_type = params.account_type.unwrap_or(AccountType::User);

    let request = RecordInstallation {
        installation_id,
        account_login,
        account_type,
        repos: Vec::new(),
    };
    installations::record_from_github(state.store.as_ref(), &user, request).await?;

    tokio::spawn(async move {
        match reconcile(state.store.as_ref(), &state.github, installation_id).await {
            Ok(summary) => info!(installation_id, synced = summary.synced, "Initial sync finished"),
            Err(e) => warn!(installation_id, error = %e, "Initial sync failed"),
        }
    });

    Ok(Redirect::to("/dashboard"))
}

#[cfg(test)]
mod tests {
    use crate::routes::router;
    use crate::store::{AccountType, InstallationUpsert, MemoryStore, RepoInput, Store, User, UserAttributes};
    use crate::test_utils::{mock_github_installation, repo_json, session_token, test_state, TEST_ISSUER};
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, LOCATION};
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::MockServer;

    async fn seed_user(store: &MemoryStore, external_id: &str) -> User {
        store
            .upsert_user(UserAttributes {
                external_id: external_id.to_string(),
                name: external_id.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn seed_installation(store: &MemoryStore, installation_id: i64, owner: &User) {
        store
            .upsert_installation(InstallationUpsert {
                installation_id,
                account_login: "acme".to_string(),
                account_type: AccountType::Organization,
                connected_by_user_id: Some(owner.id.clone()),
            })
            .await
            .unwrap();
        store
            .upsert_repos_for_installation(
                installation_id,
                &[RepoInput {
                    owner: "acme".to_string(),
                    name: "widgets".to_string(),
                    default_branch: Some("main".to_string()),
                }],
                Some(&owner.id),
            )
            .await
            .unwrap();
    }

    fn get(uri: &str, subject: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(sub) = subject {
            builder = builder.header(
                AUTHORIZATION,
                format!("Bearer {}", session_token(sub, TEST_ISSUER, 300)),
            );
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_me_requires_session() {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "user_1").await;
        let app = router(Arc::new(test_state(store, "http://127.0.0.1:9")));

        let response = app.clone().oneshot(get("/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.clone().oneshot(get("/me", Some("user_1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["external_id"], "user_1");

        // Valid session, but no local user yet.
        let response = app.oneshot(get("/me", Some("user_unknown"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_repos_visible_only_to_connector() {
        let store = Arc::new(MemoryStore::new());
        let alice = seed_user(&store, "alice").await;
        seed_user(&store, "mallory").await;
        seed_installation(&store, 7, &alice).await;
        let app = router(Arc::new(test_state(store, "http://127.0.0.1:9")));

        let response = app
            .clone()
            .oneshot(get("/installations/7/repos", Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let repos = json_body(response).await;
        assert_eq!(repos.as_array().unwrap().len(), 1);
        assert_eq!(repos[0]["name"], "widgets");

        let response = app
            .clone()
            .oneshot(get("/installations/7/repos", Some("mallory")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json_body(response).await["error"],
            "Not authorized to view this installation"
        );

        let response = app.oneshot(get("/installations", Some("mallory"))).await.unwrap();
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_create_installation() {
        let store = Arc::new(MemoryStore::new());
        let alice = seed_user(&store, "alice").await;
        let app = router(Arc::new(test_state(store.clone(), "http://127.0.0.1:9")));

        let body = json!({
            "installationId": 11,
            "accountLogin": "alice",
            "accountType": "User",
            "repos": [{ "owner": "alice", "name": "dotfiles", "defaultBranch": "main" }]
        });
        let request = Request::builder()
            .method("POST")
            .uri("/installations")
            .header("content-type", "application/json")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", session_token("alice", TEST_ISSUER, 300)),
            )
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let install = store.find_installation(11).await.unwrap().unwrap();
        assert_eq!(install.connected_by_user_id.as_deref(), Some(alice.id.as_str()));
        let repo = store.find_repo("alice", "dotfiles").await.unwrap().unwrap();
        assert_eq!(repo.installation_id, 11);
    }

    #[tokio::test]
    async fn test_manual_sync() {
        let server = MockServer::start().await;
        mock_github_installation(
            &server,
            7,
            vec![
                repo_json("acme", "widgets", None),
                repo_json("acme", "gadgets", Some("develop")),
            ],
        )
        .await;
        let store = Arc::new(MemoryStore::new());
        let alice = seed_user(&store, "alice").await;
        seed_installation(&store, 7, &alice).await;
        let app = router(Arc::new(test_state(store.clone(), &server.uri())));

        let request = Request::builder()
            .method("POST")
            .uri("/installations/7/sync")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", session_token("alice", TEST_ISSUER, 300)),
            )
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "synced": 2 }));
        let widgets = store.find_repo("acme", "widgets").await.unwrap().unwrap();
        assert_eq!(widgets.default_branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_manual_sync_upstream_failure_is_502() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let alice = seed_user(&store, "alice").await;
        seed_installation(&store, 7, &alice).await;
        let app = router(Arc::new(test_state(store, &server.uri())));

        let request = Request::builder()
            .method("POST")
            .uri("/installations/7/sync")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", session_token("alice", TEST_ISSUER, 300)),
            )
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_install_callback_records_and_syncs() {
        let server = MockServer::start().await;
        mock_github_installation(&server, 21, vec![repo_json("octo", "hello", Some("main"))]).await;
        let store = Arc::new(MemoryStore::new());
        let alice = seed_user(&store, "alice").await;
        let app = router(Arc::new(test_state(store.clone(), &server.uri())));

        let response = app
            .oneshot(get(
                "/github/install/callback?installation_id=21&account_login=octo&account_type=Organization",
                Some("alice"),
            ))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[LOCATION], "/dashboard");
        let install = store.find_installation(21).await.unwrap().unwrap();
        assert_eq!(install.connected_by_user_id.as_deref(), Some(alice.id.as_str()));

        // The initial sync runs in the background.
        let mut synced = None;
        for _ in 0..50 {
            synced = store.find_repo("octo", "hello").await.unwrap();
            if synced.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let repo = synced.expect("background sync never stored the repo");
        assert_eq!(repo.connected_by_user_id.as_deref(), Some(alice.id.as_str()));
    }

    #[tokio::test]
    async fn test_install_callback_without_session_redirects_home() {
        let store = Arc::new(MemoryStore::new());
        let app = router(Arc::new(test_state(store.clone(), "http://127.0.0.1:9")));

        let response = app
            .oneshot(get(
                "/github/install/callback?installation_id=21&account_login=octo&account_type=User",
                None,
            ))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[LOCATION], "/");
        assert!(store.find_installation(21).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_callback_missing_params() {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "alice").await;
        let app = router(Arc::new(test_state(store, "http://127.0.0.1:9")));

        let response = app
            .oneshot(get("/github/install/callback?installation_id=21", Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_install_callback_without_session_ignores_params() {
        let store = Arc::new(MemoryStore::new());
        let app = router(Arc::new(test_state(store, "http://127.0.0.1:9")));

        let response = app
            .oneshot(get("/github/install/callback", None))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[LOCATION], "/");
    }

    #[tokio::test]
    async fn test_install_callback_defaults_account_type_to_user() {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "alice").await;
        let app = router(Arc::new(test_state(store.clone(), "http://127.0.0.1:9")));

        let response = app
            .oneshot(get(
                "/github/install/callback?installation_id=21&account_login=alice",
                Some("alice"),
            ))
            .await
            .unwrap();

        assert_eq!(response.headers()[LOCATION], "/dashboard");
        let install = store.find_installation(21).await.unwrap().unwrap();
        assert_eq!(install.account_type, AccountType::User);
    }
}

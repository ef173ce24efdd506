pub mod github_webhook;
pub mod installations;
pub mod users_webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/github/webhook", post(github_webhook::github_webhook_handler))
        .route("/clerk-users-webhook", post(users_webhook::users_webhook_handler))
        .route("/github/install/callback", get(installations::install_callback))
        .route("/me", get(installations::me))
        .route(
            "/installations",
            get(installations::list_installations).post(installations::create_installation),
        )
        .route("/installations/{id}/repos", get(installations::list_repos))
        .route("/installations/{id}/sync", post(installations::sync_installation))
        .route("/", get(|| async { "gh-install-sync is running" }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_liveness() {
        let app = router(Arc::new(test_state(Arc::new(MemoryStore::new()), "http://127.0.0.1:9")));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"gh-install-sync is running");
    }
}

//! OAuth callback and token retrieval endpoints
//!
//! Endpoints:
//! - GET /oauth_callback?code=...  exchange the code, redirect to the frontend
//! - GET /api/token                current token as `{ "access_token": ... }`, 404 before login
//!
//! `/api/token` is also what a separate relay instance points its
//! `token_source_url` at.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::Deserialize;
use streamlabs_auth::OAuthExchanger;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::metrics;

/// Shared state for the OAuth handlers.
#[derive(Clone)]
pub struct OAuthState {
    exchanger: Arc<OAuthExchanger>,
    frontend_url: Arc<str>,
}

impl OAuthState {
    pub fn new(exchanger: Arc<OAuthExchanger>, frontend_url: &str) -> Self {
        Self {
            exchanger,
            frontend_url: Arc::from(frontend_url),
        }
    }
}

/// Build the router for the OAuth callback and token endpoints.
pub fn build_oauth_router(state: OAuthState) -> Router {
    Router::new()
        .route("/oauth_callback", get(oauth_callback))
        .route("/api/token", get(current_token))
        .with_state(state)
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// Frontend URL with `login=success` appended to its query.
fn login_redirect_url(frontend_url: &str) -> String {
    let separator = if frontend_url.contains('?') { '&' } else { '?' };
    format!("{frontend_url}{separator}login=success")
}

/// GET /oauth_callback: exchange the authorization code and store the token.
///
/// 303 to the frontend on success, 400 without a code, 500 when the exchange fails.
#[instrument(skip_all)]
async fn oauth_callback(
    State(state): State<OAuthState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let code = params.code.unwrap_or_default();
    let response = match state.exchanger.exchange(&code).await {
        Ok(_) => {
            info!("OAuth login completed");
            metrics::record_exchange("success");
            Redirect::to(&login_redirect_url(&state.frontend_url)).into_response()
        }
        Err(e) => {
            metrics::record_exchange(e.kind());
            ApiError::from(e).into_response()
        }
    };
    metrics::record_request("/oauth_callback", response.status().as_u16());
    response
}

/// GET /api/token: hand out the current token.
async fn current_token(State(state): State<OAuthState>) -> Response {
    let response = match state.exchanger.store().get().await {
        Some(token) => axum::Json(serde_json::json!({ "access_token": token.expose() }))
            .into_response(),
        None => ApiError::NoToken.into_response(),
    };
    metrics::record_request("/api/token", response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::Secret;
    use streamlabs_auth::{AccessToken, OAuthClient, TokenStore};
    use tower::ServiceExt;

    /// Mock Streamlabs token endpoint answering every POST with `reply`.
    async fn start_token_endpoint(reply: serde_json::Value) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/v2.0/token", listener.local_addr().unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let app = axum::Router::new().route(
            "/api/v2.0/token",
            axum::routing::post(move || {
                let counter = counter.clone();
                let reply = reply.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(reply)
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (url, calls)
    }

    fn test_state(token_endpoint: &str, store: Arc<TokenStore>) -> OAuthState {
        let oauth = OAuthClient {
            client_id: "client-123".into(),
            client_secret: Secret::new("secret-456".into()),
            redirect_uri: "http://localhost:8000/oauth_callback".into(),
            token_endpoint: token_endpoint.into(),
        };
        let exchanger = OAuthExchanger::new(reqwest::Client::new(), oauth, store);
        OAuthState::new(Arc::new(exchanger), "https://overlay.example.com")
    }

    async fn body_text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn callback_stores_token_and_redirects() {
        let (url, calls) = start_token_endpoint(serde_json::json!({ "access_token": "tok_1" })).await;
        let store = Arc::new(TokenStore::new());
        let app = build_oauth_router(test_state(&url, store.clone()));

        let response = app.oneshot(get("/oauth_callback?code=abc123")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "https://overlay.example.com?login=success"
        );
        assert_eq!(store.get().await.unwrap().expose(), "tok_1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_without_code_is_400_and_skips_upstream() {
        let (url, calls) = start_token_endpoint(serde_json::json!({ "access_token": "tok_1" })).await;
        let store = Arc::new(TokenStore::new());

        for uri in ["/oauth_callback", "/oauth_callback?code="] {
            let app = build_oauth_router(test_state(&url, store.clone()));
            let response = app.oneshot(get(uri)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
            assert_eq!(body_text(response).await, "Missing authorization code");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn callback_exchange_failure_is_500_and_keeps_old_token() {
        let (url, _calls) =
            start_token_endpoint(serde_json::json!({ "error": "invalid_grant" })).await;
        let store = Arc::new(TokenStore::new());
        store.set(AccessToken::new("tok_0")).await;
        let app = build_oauth_router(test_state(&url, store.clone()));

        let response = app.oneshot(get("/oauth_callback?code=stale")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Token exchange failed");
        assert_eq!(store.get().await.unwrap().expose(), "tok_0");
    }

    #[tokio::test]
    async fn callback_unreachable_token_endpoint_is_500() {
        let store = Arc::new(TokenStore::new());
        let app = build_oauth_router(test_state("http://127.0.0.1:1/api/v2.0/token", store.clone()));

        let response = app.oneshot(get("/oauth_callback?code=abc123")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn token_endpoint_404_before_login() {
        let store = Arc::new(TokenStore::new());
        let app = build_oauth_router(test_state("http://unused", store));

        let response = app.oneshot(get("/api/token")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "No token");
    }

    #[tokio::test]
    async fn token_endpoint_returns_current_token() {
        let store = Arc::new(TokenStore::new());
        store.set(AccessToken::new("tok_1")).await;
        let app = build_oauth_router(test_state("http://unused", store));

        let response = app.oneshot(get("/api/token")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json, serde_json::json!({ "access_token": "tok_1" }));
    }

    #[test]
    fn redirect_url_appends_to_existing_query() {
        assert_eq!(
            login_redirect_url("https://overlay.example.com/app"),
            "https://overlay.example.com/app?login=success"
        );
        assert_eq!(
            login_redirect_url("https://overlay.example.com/app?theme=dark"),
            "https://overlay.example.com/app?theme=dark&login=success"
        );
    }
}

pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{Next, from_fn_with_state},
    response::Response,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::auth::AuthError;
use crate::config::GatewayConfig;
use state::AppState;
use types::ApiError;

/// Bearer-token middleware: resolves the caller and injects `AuthenticatedUser`
async fn bearer_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // Step 1: Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    // Step 2: Strip scheme
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid token format"))?;

    // Step 3: Verify and inject
    let user = state.authenticator.authenticate(token).map_err(|e| {
        tracing::debug!("Authentication rejected: {}", e);
        ApiError::from(e)
    })?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Build the full `/api/v1` router
pub fn router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Private Routes (bearer token required)
    // ==========================================================================
    let private_routes = Router::new()
        // Records
        .route("/records", post(handlers::create_record))
        .route(
            "/records/{id}",
            get(handlers::get_record)
                .put(handlers::update_record)
                .delete(handlers::delete_record),
        )
        // Transfers
        .route("/transfers", post(handlers::create_transfer))
        // Profile
        .route("/profile", get(handlers::get_profile))
        .route("/profile/accounts", post(handlers::add_account))
        .route("/profile/budget", put(handlers::set_budget))
        .route("/profile/audit", get(handlers::get_audit))
        .layer(from_fn_with_state(state.clone(), bearer_auth_middleware));

    let api = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(private_routes);

    Router::new().nest("/api/v1", api).with_state(state)
}

/// Start HTTP Gateway server
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    use anyhow::Context;

    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port in use?)", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtAuthenticator;
    use crate::ledger::memory::MemoryLedgerStore;
    use crate::ledger::types::UserId;
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const SECRET: &str = "gateway-test-secret";

    struct TestApp {
        router: Router,
        store: Arc<MemoryLedgerStore>,
        token: String,
    }

    impl TestApp {
        fn new() -> Self {
            let store = Arc::new(MemoryLedgerStore::new());
            let auth = Arc::new(JwtAuthenticator::new(SECRET));
            let token = auth
                .issue(&UserId::new("alice"), chrono::Duration::hours(1))
                .unwrap();
            let state = Arc::new(AppState::new(store.clone(), 20, auth));
            Self {
                router: router(state),
                store,
                token,
            }
        }

        async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            self.call_with(method, uri, body, &[]).await
        }

        async fn call_with(
            &self,
            method: Method,
            uri: &str,
            body: Option<Value>,
            extra: &[(&str, &str)],
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            for (name, value) in extra {
                builder = builder.header(*name, *value);
            }
            let request = match body {
                Some(json) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            send(&self.router, request).await
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new();
        let request = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["store"], "memory");
    }

    #[tokio::test]
    async fn test_missing_and_bad_tokens_rejected() {
        let app = TestApp::new();

        let request = Request::builder()
            .uri("/api/v1/profile")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], types::error_codes::MISSING_AUTH);

        let request = Request::builder()
            .uri("/api/v1/profile")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_record_lifecycle_over_http() {
        let app = TestApp::new();

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/records",
                Some(json!({"amount": "250.00", "type": "income", "wallet": "cash", "description": "salary"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["amount"], "250.00");

        let (_, body) = app.call(Method::GET, "/api/v1/profile", None).await;
        assert_eq!(body["data"]["profile"]["balance"]["cash"], "250.00");
        assert_eq!(body["data"]["recent"].as_array().unwrap().len(), 1);

        let (status, body) = app
            .call(
                Method::PUT,
                &format!("/api/v1/records/{id}"),
                Some(json!({"amount": "100", "type": "expense", "wallet": "cash"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["version"], 2);

        let (status, body) = app
            .call(Method::DELETE, &format!("/api/v1/records/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], true);

        let (status, body) = app
            .call(Method::GET, &format!("/api/v1/records/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], types::error_codes::NOT_FOUND);

        let (_, body) = app.call(Method::GET, "/api/v1/profile/audit", None).await;
        assert_eq!(body["data"]["records_scanned"], 0);
    }

    #[tokio::test]
    async fn test_strict_amounts_rejected() {
        let app = TestApp::new();
        for amount in [
            json!(".5"),
            json!("5."),
            json!("-3"),
            json!("1e3"),
            json!(12),
            json!("0.000000001"),
            json!("10000000000000000000000"),
        ] {
            let (status, body) = app
                .call(
                    Method::POST,
                    "/api/v1/records",
                    Some(json!({"amount": amount, "type": "expense"})),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "amount {amount}");
            assert_eq!(body["code"], types::error_codes::INVALID_INPUT);
        }

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/records",
                Some(json!({"amount": "0", "type": "expense"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transfer_replay_via_header() {
        let app = TestApp::new();
        app.call(
            Method::POST,
            "/api/v1/records",
            Some(json!({"amount": "1000", "type": "income"})),
        )
        .await;

        let body = json!({"amount": "200", "from_wallet": "bank", "to_wallet": "cash", "locale": "id"});
        let (status, first) = app
            .call_with(
                Method::POST,
                "/api/v1/transfers",
                Some(body.clone()),
                &[("Idempotency-Key", "tx-42")],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["replayed"], false);
        assert_eq!(first["data"]["expense"]["description"], "Transfer ke tunai");
        assert_eq!(first["data"]["profile"]["balance"]["bank"], "800");

        let (_, second) = app
            .call_with(
                Method::POST,
                "/api/v1/transfers",
                Some(body),
                &[("Idempotency-Key", "tx-42")],
            )
            .await;
        assert_eq!(second["data"]["replayed"], true);
        assert_eq!(second["data"]["transfer_id"], first["data"]["transfer_id"]);
        assert_eq!(second["data"]["profile"]["balance"]["cash"], "200");
    }

    #[tokio::test]
    async fn test_conflicting_keys_rejected() {
        let app = TestApp::new();
        let (status, _) = app
            .call_with(
                Method::POST,
                "/api/v1/transfers",
                Some(json!({"amount": "1", "to_wallet": "cash", "idempotency_key": "a"})),
                &[("Idempotency-Key", "b")],
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_profile_accounts_and_budget() {
        let app = TestApp::new();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/profile/accounts",
                Some(json!({"name": "BCA", "metadata": {"number": "1234"}})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["accounts"][0]["name"], "BCA");
        assert_eq!(body["data"]["accounts"][0]["metadata"]["number"], "1234");

        let (status, body) = app
            .call(Method::PUT, "/api/v1/profile/budget", Some(json!({"budget": "1500"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["budget"], "1500");
    }

    #[tokio::test]
    async fn test_write_failure_hides_detail() {
        let app = TestApp::new();
        app.store.set_fail_writes(true);
        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/records",
                Some(json!({"amount": "5", "type": "expense"})),
            )
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["msg"], "Storage temporarily unavailable");
        assert!(body.get("data").is_none());
    }
}

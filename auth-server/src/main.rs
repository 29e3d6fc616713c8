mod api;
mod cache;
mod config;
mod errors;
mod headers;
mod openapi;
mod seed;
mod state;
#[cfg(test)]
mod test_utils;

use crate::state::AppState;
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use token_engine::TokenEngine;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

/// Period of the sweep deleting expired codes and token records.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let config = match config::AuthConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Signing with key '{}' as issuer '{}'",
        state.engine.key_store().active_kid(),
        state.engine.key_store().issuer()
    );

    let maintenance = tokio::spawn(run_maintenance(state.engine.clone(), MAINTENANCE_INTERVAL));

    let app = create_app(state).await;

    // Start server
    let server = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Start the server and wait for it to finish
    info!("Server running on {}, press Ctrl+C to stop", addr);
    let serve = axum::serve(server, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    maintenance.abort();
    if let Err(e) = serve {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Create a new application instance with a given state
pub async fn create_app(state: AppState) -> Router {
    // Create OpenAPI documentation
    let (openapi_router, api_doc) =
        OpenApiRouter::with_openapi(openapi::ApiDoc::openapi()).split_for_parts();
    let openapi_json = api_doc.clone();

    Router::new()
        .merge(api::router())
        .merge(openapi_router)
        .route("/openapi.json", get(move || async move { Json(openapi_json) }))
        .merge(Scalar::with_url("/scalar", api_doc))
        .with_state(state)
}

/// Deletes expired codes and token records every `period`. Failures are
/// logged and retried on the next tick.
async fn run_maintenance(engine: TokenEngine, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        if let Err(e) = engine.cleanup_expired().await {
            warn!("Expiry sweep failed: {}", e);
        }
    }
}

// Simple signal handler that works on all platforms
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        TestFixture, CLIENT_ID, CLIENT_SECRET, TENANT_ID, USER_EMAIL, USER_PASSWORD,
    };
    use http::StatusCode;
    use serde_json::Value;
    use token_engine::models::TokenType;
    use token_engine::JwksCache;
    use url::Url;

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/no/such/route").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json()["detail"], "No route for /no/such/route");
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/openapi.json").await;
        response.assert_ok();
        assert_eq!(
            response.json()["info"]["title"],
            "Authorization Server API"
        );
        assert!(response.json()["paths"]["/oauth/token"].is_object());
    }

    #[tokio::test]
    async fn test_maintenance_sweeps_expired_records() {
        let mut settings = crate::config::AuthConfig::for_test();
        settings.oauth.access_token_ttl = 1;
        settings.oauth.refresh_token_ttl = 1;
        let fixture = TestFixture::with_config(settings).await;
        fixture.password_grant().await;

        let sweeper = tokio::spawn(run_maintenance(
            fixture.state.engine.clone(),
            Duration::from_millis(100),
        ));
        // Deadlines have second granularity.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        sweeper.abort();

        let report = fixture.state.engine.cleanup_expired().await.unwrap();
        assert_eq!(report.tokens, 0, "the sweep should already have run");
    }

    /// Serves the app on a real socket and verifies an issued token through
    /// the published key set.
    #[tokio::test]
    async fn test_issued_tokens_verify_against_served_jwks() {
        let fixture = TestFixture::new().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = fixture.app.clone();
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let body: Value = reqwest::Client::new()
            .post(format!("http://{addr}/oauth/token"))
            .basic_auth(CLIENT_ID, Some(CLIENT_SECRET))
            .form(&[
                ("grant_type", "password"),
                ("username", USER_EMAIL),
                ("password", USER_PASSWORD),
            ])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let access_token = body["accessToken"].as_str().unwrap();

        let jwks = JwksCache::new(
            Url::parse(&format!("http://{addr}/oauth/jwks")).unwrap(),
            Duration::from_secs(60),
        );
        let claims = jwks.verify(access_token, "auth-service").await.unwrap();
        assert_eq!(claims.sub, "user:u-1");
        assert_eq!(claims.client_id, CLIENT_ID);
        assert_eq!(claims.tenant_id, TENANT_ID);
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.kid, "k1");

        server.abort();
    }
}

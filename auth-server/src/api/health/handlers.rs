use super::checkers::{check_cache, check_keys, run_health_check};
use super::models::{ComponentHealth, ComponentStatus, HealthResponse, HealthStatusType};
use crate::openapi::HEALTH_TAG;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use log::{debug, info};
use std::time::Duration;
use tokio::task::JoinHandle;

async fn join_check(component: &str, handle: JoinHandle<ComponentStatus>) -> ComponentStatus {
    handle.await.unwrap_or_else(|e| {
        log::error!("{component} check task panicked: {e:?}");
        ComponentStatus::error(format!("{component} check task failed"))
    })
}

/// Runs the component checks concurrently, each under the configured timeout
async fn check_all_health(state: &AppState) -> HealthResponse {
    let limit = Duration::from_secs_f64(state.settings.healthcheck_timeout);
    let cache = tokio::spawn(run_health_check(
        "Cache",
        limit,
        check_cache(state.cache.clone()),
    ));
    let keys = tokio::spawn(run_health_check(
        "Keys",
        limit,
        check_keys(state.engine.key_store().clone()),
    ));

    let components = ComponentHealth {
        cache: join_check("Cache", cache).await,
        keys: join_check("Keys", keys).await,
    };

    let failures = components.failures();
    if failures.is_empty() {
        debug!("Health check passed for all components");
    } else {
        info!("Health check failed: {}", failures.join(", "));
    }
    HealthResponse::from(components)
}

/// Liveness check; does not touch any component
#[utoipa::path(
    get,
    path = "/health",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Process is up")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": HealthStatusType::Ok }))
}

/// Readiness check covering the denylist cache and the signing keys
#[utoipa::path(
    get,
    path = "/ready",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse)
    )
)]
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    check_all_health(&state).await
}

/// Alias of the readiness check
#[utoipa::path(
    get,
    path = "/healthz",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is not healthy", body = HealthResponse)
    )
)]
pub async fn healthz_check(State(state): State<AppState>) -> impl IntoResponse {
    check_all_health(&state).await
}

#[cfg(test)]
mod test {
    use crate::test_utils::TestFixture;
    use http::StatusCode;

    #[tokio::test]
    async fn test_health_endpoint() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/health").await;
        response.assert_ok();
        assert_eq!(response.json()["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_endpoint_reports_components() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/ready").await;
        response.assert_ok();

        let body = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["components"]["cache"]["status"], "ok");
        assert_eq!(body["components"]["cache"]["details"]["backend"], "in-memory");
        assert_eq!(body["components"]["keys"]["status"], "ok");
        assert_eq!(body["components"]["keys"]["details"]["active_kid"], "k1");
    }

    #[tokio::test]
    async fn test_healthz_alias() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/healthz").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json()["status"], "ok");
    }
}

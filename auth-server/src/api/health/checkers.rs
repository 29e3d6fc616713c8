use super::models::ComponentStatus;
use crate::cache::{Cache, CacheBackend};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use token_engine::KeyStore;

pub async fn check_cache(cache: Arc<Cache>) -> ComponentStatus {
    match cache.health_check().await {
        Ok(()) => ComponentStatus::ok(json!({ "backend": cache.kind() })),
        Err(err) => ComponentStatus::error(format!("Cache health check failed: {err}")),
    }
}

/// The active kid must be published, otherwise issued tokens cannot be verified.
pub async fn check_keys(keys: Arc<KeyStore>) -> ComponentStatus {
    let active = keys.active_kid();
    if keys.jwks().find(&active).is_none() {
        return ComponentStatus::error(format!("Active key '{active}' is not published"));
    }
    ComponentStatus::ok(json!({
        "active_kid": active,
        "published": keys.kids().len(),
    }))
}

/// Runs one component check, failing it once `limit` elapses.
pub async fn run_health_check(
    component: &'static str,
    limit: Duration,
    check: impl Future<Output = ComponentStatus>,
) -> ComponentStatus {
    tokio::time::timeout(limit, check)
        .await
        .unwrap_or_else(|_| {
            ComponentStatus::error(format!(
                "{component} health check timed out after {:.1} seconds",
                limit.as_secs_f64()
            ))
        })
}

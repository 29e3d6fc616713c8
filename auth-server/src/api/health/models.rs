use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatusType {
    Ok,
    Error,
}

/// Readiness report; answered with 503 when any component is failing.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatusType,
    pub components: ComponentHealth,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentHealth {
    /// Revocation denylist backend
    pub cache: ComponentStatus,
    /// Signing key set
    pub keys: ComponentStatus,
}

impl ComponentHealth {
    pub fn failures(&self) -> Vec<String> {
        [("cache", &self.cache), ("keys", &self.keys)]
            .into_iter()
            .filter_map(|(name, component)| {
                component
                    .error
                    .as_deref()
                    .map(|error| format!("{name}: {error}"))
            })
            .collect()
    }
}

impl From<ComponentHealth> for HealthResponse {
    fn from(components: ComponentHealth) -> Self {
        let status = if components.failures().is_empty() {
            HealthStatusType::Ok
        } else {
            HealthStatusType::Error
        };
        Self { status, components }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentStatus {
    pub status: HealthStatusType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentStatus {
    pub fn ok(details: serde_json::Value) -> Self {
        Self {
            status: HealthStatusType::Ok,
            error: None,
            details: Some(details),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatusType::Error,
            error: Some(error.into()),
            details: None,
        }
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let code = match self.status {
            HealthStatusType::Ok => StatusCode::OK,
            HealthStatusType::Error => StatusCode::SERVICE_UNAVAILABLE,
        };
        (code, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failing_component_turns_report_unhealthy() {
        let report = HealthResponse::from(ComponentHealth {
            cache: ComponentStatus::error("PING refused"),
            keys: ComponentStatus::ok(json!({ "active_kid": "k1" })),
        });

        assert_eq!(report.status, HealthStatusType::Error);
        assert_eq!(report.components.failures(), vec!["cache: PING refused"]);
        assert_eq!(
            serde_json::to_value(&report).unwrap()["components"]["cache"],
            json!({ "status": "error", "error": "PING refused" })
        );
        assert_eq!(
            report.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

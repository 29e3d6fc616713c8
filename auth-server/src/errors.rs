use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::WWW_AUTHENTICATE;
use http::{HeaderValue, StatusCode};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use token_engine::EngineError;
use utoipa::ToSchema;

/// Challenge sent with 401 answers on the Basic-authenticated endpoints.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="oauth2""#;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a detail message and status code
    pub fn new<S: ToString>(detail: S, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status_code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code;
        let body = json!({
            "detail": self.detail,
        });
        (status_code, Json(body)).into_response()
    }
}

/// OAuth 2.0 error body (RFC 6749 Section 5.2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OAuthErrorBody {
    /// Error code
    pub error: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// An OAuth error together with the status and headers it is sent with.
#[derive(Debug, Clone)]
pub struct OAuthError {
    pub status_code: StatusCode,
    pub body: OAuthErrorBody,
    challenge: bool,
}

impl OAuthError {
    pub fn new(status_code: StatusCode, error: &str, description: Option<String>) -> Self {
        Self {
            status_code,
            body: OAuthErrorBody {
                error: error.to_string(),
                error_description: description,
            },
            challenge: false,
        }
    }

    pub fn invalid_request<S: ToString>(description: S) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some(description.to_string()),
        )
    }

    pub fn unsupported_grant_type(grant_type: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            Some(format!("grant_type '{grant_type}' is not supported")),
        )
    }

    pub fn unsupported_response_type() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unsupported_response_type",
            Some("response_type must be 'code'".to_string()),
        )
    }

    pub fn access_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, "access_denied", None)
    }

    /// 401 carrying the Basic challenge
    pub fn invalid_client_basic() -> Self {
        Self {
            challenge: true,
            ..Self::new(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                Some("client authentication failed".to_string()),
            )
        }
    }

    /// Same error, plus the Basic challenge when it is a 401
    pub fn with_basic_challenge(mut self) -> Self {
        self.challenge = self.status_code == StatusCode::UNAUTHORIZED;
        self
    }
}

impl From<EngineError> for OAuthError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::InvalidClient(_) => Self::new(
                StatusCode::UNAUTHORIZED,
                err.error_code(),
                Some("client authentication failed".to_string()),
            ),
            EngineError::AccessDenied => Self::access_denied(),
            e if e.is_internal() => {
                error!("Internal error while serving an OAuth request: {}", e);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    Some("internal error".to_string()),
                )
            }
            e => Self::new(StatusCode::BAD_REQUEST, e.error_code(), Some(e.to_string())),
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let mut response = (self.status_code, Json(self.body)).into_response();
        if self.challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }
        response
    }
}

pub(crate) mod health;
pub(crate) mod oauth;

use crate::errors::ApiError;
use crate::state::AppState;
use axum::http::{StatusCode, Uri};
use axum::Router;

/// Combines all API routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(oauth::router())
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::new(format!("No route for {}", uri.path()), StatusCode::NOT_FOUND)
}

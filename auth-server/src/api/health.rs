mod checkers;
pub(crate) mod handlers;
mod models;

use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        .route("/healthz", get(handlers::healthz_check))
}

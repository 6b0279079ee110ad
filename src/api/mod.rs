use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/field", get(handlers::get_field))
        .route("/api/reload", post(handlers::post_reload))
        .with_state(state)
}

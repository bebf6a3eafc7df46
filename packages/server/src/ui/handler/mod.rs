//! Handler modules for the status API.

pub mod http;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::ui::state::AppState;

pub use http::{get_status, health_check, reset_desktop_link, set_desktop_target};

/// Build the status API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/desktop/reset", post(reset_desktop_link))
        .route("/api/desktop/target", put(set_desktop_target))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

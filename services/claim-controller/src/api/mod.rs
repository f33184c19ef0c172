//! HTTP API: health probes and the claim admission check.

pub mod admission;
pub mod error;
mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(admission::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

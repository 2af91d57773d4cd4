//! JSON API handler modules.

pub mod emergency_stop;
pub mod health;
pub mod overrides;
pub mod rules;
pub mod sse;
pub mod status;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::get))
        .route("/health", get(health::get))
        .route(
            "/devices/{id}/override",
            put(overrides::set).delete(overrides::clear),
        )
        .route("/emergency-stop", post(emergency_stop::set))
        .route("/rules", put(rules::reload))
        .route("/events/stream", get(sse::stream))
}

//! Route definitions and router assembly for the Leakgate API.

pub mod events;
pub mod findings;
pub mod health;
pub mod patterns;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/events/slack", post(events::receive))
        .route("/patterns", get(patterns::list).post(patterns::create))
        .route(
            "/patterns/{id}",
            get(patterns::get_by_id).put(patterns::update),
        )
        .route("/patterns/{id}/disable", post(patterns::disable))
        .route("/findings", get(findings::list))
        .route("/findings/{id}", get(findings::get_by_id));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Call control
        .route("/calls/start", post(handlers::start_call))
        .route("/calls/:session_id/say", post(handlers::say))
        .route("/calls/:session_id/end", post(handlers::end_call))
        // Call queries
        .route("/calls/:session_id/status", get(handlers::get_status))
        .route(
            "/calls/:session_id/transcript",
            get(handlers::get_transcript),
        )
        // Browser front-ends talk to this API directly
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

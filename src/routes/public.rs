use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that ignore caller identity entirely.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
        // GET /posts
        // Every post with its body, unfiltered. Trusted consumers only.
        .route("/posts", get(handlers::get_all_post))
        // GET /posts/preview
        // Every post without its body, unfiltered.
        .route("/posts/preview", get(handlers::get_all_preview))
}

use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Caller-aware listings, nested under `/auth` by `create_router`.
///
/// Both resolve `MaybeUser`: anonymous callers see public posts, ordinary callers
/// add their own, and callers holding role `0` see everything.
pub fn listing_routes() -> Router<AppState> {
    Router::new()
        // GET /auth/posts/preview
        .route("/posts/preview", get(handlers::get_preview_with_perm))
        // GET /auth/posts/tag/{tag}
        // Same visibility rule, restricted to posts carrying `tag`.
        .route("/posts/tag/{tag}", get(handlers::get_tag_preview_with_perm))
}

/// Single-post routes.
///
/// GET, PATCH and DELETE run the `LoadedPost` step first, so an unknown id is a 404
/// before anything else is checked. POST creates the post under the path id.
pub fn post_routes() -> Router<AppState> {
    Router::new().route(
        "/posts/{id}",
        get(handlers::get_one_post)
            .post(handlers::create_post)
            .patch(handlers::patch_post)
            .delete(handlers::delete_post),
    )
}

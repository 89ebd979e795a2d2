use crate::{
    AppState,
    access::{ViewScope, authorize_read},
    auth::{AuthUser, MaybeUser},
    error::{ApiError, StoreError},
    models::{ANONYMOUS_AUTHOR, ApiResponse, CreatePostRequest, Post, PostPreview, UpdatePostRequest},
    repository::RepositoryState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{FromRef, FromRequest, FromRequestParts, Path, Request, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
};

// --- Load Step ---

/// LoadedPost
///
/// The post named by the `{id}` path segment, fetched before the handler body runs.
/// Endpoints that act on a single post take this as their first argument, so the
/// not-found and store-error responses are produced in one place and before any
/// authentication or authorization logic.
#[derive(Debug, Clone)]
pub struct LoadedPost(pub Post);

impl<S> FromRequestParts<S> for LoadedPost
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        let repo = RepositoryState::from_ref(state);
        load_post(&repo, &id).await.map(LoadedPost)
    }
}

/// load_post
///
/// Looks up a post by id. A missing post is a 404; any store failure is passed through.
pub async fn load_post(repo: &RepositoryState, id: &str) -> Result<Post, ApiError> {
    repo.find_one(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cannot find post".to_string()))
}

/// MergePatch
///
/// PATCH body. An empty body is a merge of nothing and leaves the post unchanged.
/// A non-empty body must be a JSON object; the content type is not checked.
#[derive(Debug, Clone, Default)]
pub struct MergePatch(pub UpdatePostRequest);

impl<S> FromRequest<S> for MergePatch
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(MergePatch::default());
        }
        let Json(patch) = Json::<UpdatePostRequest>::from_bytes(&bytes)
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        Ok(MergePatch(patch))
    }
}

// --- Handlers ---

/// get_all_post
///
/// [Trusted Route] Lists every post with its full body. No visibility filtering is
/// applied, so this endpoint must only be exposed to trusted consumers.
#[utoipa::path(
    get,
    path = "/posts",
    responses(
        (status = 200, description = "All posts, wrapped in the success envelope", body = [Post]),
        (status = 500, description = "Store error")
    )
)]
pub async fn get_all_post(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Post>>>, ApiError> {
    let posts = state.repo.find_all().await?;
    Ok(Json(ApiResponse::data(posts)))
}

/// get_all_preview
///
/// [Public Route] Lists every post without its body, regardless of visibility.
#[utoipa::path(
    get,
    path = "/posts/preview",
    responses(
        (status = 200, description = "All previews", body = [PostPreview]),
        (status = 500, description = "Store error")
    )
)]
pub async fn get_all_preview(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PostPreview>>>, ApiError> {
    let previews = state.repo.find_all_previews().await?;
    Ok(Json(ApiResponse::data(previews)))
}

/// get_preview_with_perm
///
/// [Caller-Aware Route] Lists the previews the caller may see: public posts for
/// anonymous callers, public plus owned posts for ordinary callers, and everything
/// for callers holding the elevated role.
#[utoipa::path(
    get,
    path = "/auth/posts/preview",
    responses(
        (status = 200, description = "Visible previews", body = [PostPreview]),
        (status = 401, description = "Invalid token"),
        (status = 500, description = "Store error")
    )
)]
pub async fn get_preview_with_perm(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PostPreview>>>, ApiError> {
    let scope = ViewScope::for_caller(user.as_ref());
    let previews = state.repo.find_visible_previews(&scope, None).await?;
    Ok(Json(ApiResponse::data(previews)))
}

/// get_tag_preview_with_perm
///
/// [Caller-Aware Route] Same visibility rule as `get_preview_with_perm`, further
/// restricted to posts whose tags contain `tag` exactly.
#[utoipa::path(
    get,
    path = "/auth/posts/tag/{tag}",
    params(("tag" = String, Path, description = "Exact tag to match")),
    responses(
        (status = 200, description = "Visible previews carrying the tag", body = [PostPreview]),
        (status = 401, description = "Invalid token"),
        (status = 500, description = "Store error")
    )
)]
pub async fn get_tag_preview_with_perm(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<ApiResponse<Vec<PostPreview>>>, ApiError> {
    let scope = ViewScope::for_caller(user.as_ref());
    let previews = state.repo.find_visible_previews(&scope, Some(&tag)).await?;
    Ok(Json(ApiResponse::data(previews)))
}

/// get_one_post
///
/// [Caller-Aware Route] Returns a single post with its body. Private posts need a
/// caller who is either the author or holds the elevated role.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 401, description = "No login / Unauthorize"),
        (status = 404, description = "Cannot find post")
    )
)]
pub async fn get_one_post(
    LoadedPost(post): LoadedPost,
    MaybeUser(user): MaybeUser,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    authorize_read(&post, user.as_ref())?;
    Ok(Json(ApiResponse::data(post)))
}

/// create_post
///
/// [Caller-Aware Route] Stores a new post under the path `id`. The author is the
/// caller's username, or "Anonymous" when no caller is present.
///
/// Every failure other than a store timeout is reported as 400 with `errMessage`,
/// including a duplicate id.
#[utoipa::path(
    post,
    path = "/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created"),
        (status = 400, description = "Validation or store failure")
    )
)]
pub async fn create_post(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    payload.validate().map_err(ApiError::Validation)?;

    let author = user
        .map(|u| u.username)
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());
    let post = payload.into_post(id, author);

    match state.repo.insert(post).await {
        Ok(()) => Ok((StatusCode::CREATED, Json(ApiResponse::ok()))),
        Err(e @ StoreError::Timeout(_)) => Err(e.into()),
        Err(e) => Err(ApiError::Validation(e.to_string())),
    }
}

/// patch_post
///
/// [Caller-Aware Route] Merges the supplied fields into the loaded post. An empty
/// body succeeds without changing anything.
///
/// Writes are not gated on ownership or role. Writes by callers who are neither
/// the author nor elevated are logged at `warn`.
#[utoipa::path(
    patch,
    path = "/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "Malformed body or blanked required field"),
        (status = 404, description = "Cannot find post"),
        (status = 500, description = "Store error")
    )
)]
pub async fn patch_post(
    LoadedPost(post): LoadedPost,
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    MergePatch(patch): MergePatch,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    patch.validate().map_err(ApiError::Validation)?;
    warn_unowned_write("patch", &post, user.as_ref());

    state.repo.update_one(&post.id, patch).await?;
    Ok(Json(ApiResponse::ok()))
}

/// delete_post
///
/// [Caller-Aware Route] Permanently removes the loaded post. A store failure is
/// reported as `success: false` with status 500.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Cannot find post"),
        (status = 500, description = "Store error")
    )
)]
pub async fn delete_post(
    LoadedPost(post): LoadedPost,
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    warn_unowned_write("delete", &post, user.as_ref());

    state.repo.delete_one(&post.id).await?;
    tracing::info!(post_id = %post.id, "post deleted");
    Ok(Json(ApiResponse::ok()))
}

fn warn_unowned_write(action: &str, post: &Post, caller: Option<&AuthUser>) {
    let permitted = caller.is_some_and(|u| u.is_elevated() || u.owns(post));
    if !permitted {
        tracing::warn!(
            post_id = %post.id,
            caller = caller.map(|u| u.username.as_str()).unwrap_or(ANONYMOUS_AUTHOR),
            "{} on a post the caller neither owns nor administers",
            action
        );
    }
}

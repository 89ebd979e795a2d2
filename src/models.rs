use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

/// Author recorded on posts created without an authenticated caller.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

// --- Core Application Schemas (Mapped to Database) ---

/// Post
///
/// A blog post record from the `posts` table. The `id` is supplied by the client
/// on creation and is unique across the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Full body content. Never empty.
    pub post: String,
    pub is_public: bool,
    #[ts(type = "string")]
    pub time: DateTime<Utc>,
    pub read_time: f64,
    // Username of the creator, compared case-insensitively for ownership.
    pub author: String,
}

/// PostPreview
///
/// Projection of a `Post` without its body. Returned by every listing endpoint
/// except the trusted full listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostPreview {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    #[ts(type = "string")]
    pub time: DateTime<Utc>,
    pub read_time: f64,
    pub author: String,
}

impl From<Post> for PostPreview {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            description: post.description,
            tags: post.tags,
            is_public: post.is_public,
            time: post.time,
            read_time: post.read_time,
            author: post.author,
        }
    }
}

/// --- Request Payloads (Input Schemas) ---

/// CreatePostRequest
///
/// Input payload for POST /posts/{id}. The `id` comes from the path and the
/// `author` from the caller, so neither is accepted here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub post: String,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub time: Option<DateTime<Utc>>,
    pub read_time: f64,
}

impl CreatePostRequest {
    /// Rejects required string fields that are present but blank.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("post", &self.post),
        ] {
            if value.trim().is_empty() {
                return Err(format!("Post validation failed: {field} is required"));
            }
        }
        Ok(())
    }

    /// Builds the stored record. `time` falls back to the creation instant.
    pub fn into_post(self, id: String, author: String) -> Post {
        Post {
            id,
            title: self.title,
            description: self.description,
            tags: self.tags,
            post: self.post,
            is_public: self.is_public,
            time: self.time.unwrap_or_else(Utc::now),
            read_time: self.read_time,
            author,
        }
    }
}

/// UpdatePostRequest
///
/// Partial update payload for PATCH /posts/{id}. Only the fields that are `Some`
/// are written; everything else on the stored post is left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_time: Option<f64>,
}

impl UpdatePostRequest {
    /// Rejects required string fields that are supplied but blank.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("post", &self.post),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(format!("Post validation failed: {field} cannot be empty"));
            }
        }
        Ok(())
    }

    /// Merges the supplied fields into `post`.
    pub fn apply_to(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(description) = self.description {
            post.description = description;
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
        if let Some(body) = self.post {
            post.post = body;
        }
        if let Some(is_public) = self.is_public {
            post.is_public = is_public;
        }
        if let Some(time) = self.time {
            post.time = time;
        }
        if let Some(read_time) = self.read_time {
            post.read_time = read_time;
        }
    }
}

/// --- Response Envelope ---

/// ApiResponse
///
/// The uniform `{ success, data?, message?, errMessage? }` wrapper returned by every
/// endpoint. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            err_message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            err_message: None,
        }
    }

    pub fn err_message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            err_message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    /// `{"success":true}` with no payload.
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
            err_message: None,
        }
    }
}

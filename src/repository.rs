use crate::{
    access::{ViewScope, filter_previews, normalize_name},
    error::StoreError,
    models::{Post, PostPreview, UpdatePostRequest},
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;

/// Repository Trait
///
/// The abstract contract for post persistence. Handlers only see this trait, which
/// lets the Postgres store, the in-memory store and the timeout decorator be swapped
/// freely behind `RepositoryState`.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Retrieval ---
    // Every post, body included.
    async fn find_all(&self) -> Result<Vec<Post>, StoreError>;
    // Every post, projected without the body.
    async fn find_all_previews(&self) -> Result<Vec<PostPreview>, StoreError>;

    /// Previews admitted by `scope`, optionally restricted to posts tagged `tag`.
    ///
    /// The default fetches every preview and filters in-process. Stores that can
    /// express the predicate natively should override it.
    async fn find_visible_previews(
        &self,
        scope: &ViewScope,
        tag: Option<&str>,
    ) -> Result<Vec<PostPreview>, StoreError> {
        let previews = self.find_all_previews().await?;
        Ok(filter_previews(previews, scope, tag))
    }

    async fn find_one(&self, id: &str) -> Result<Option<Post>, StoreError>;

    // --- Mutations ---
    // Fails with `StoreError::Duplicate` when the id is taken.
    async fn insert(&self, post: Post) -> Result<(), StoreError>;
    // Merge semantics: only the `Some` fields of `patch` are written.
    async fn update_one(&self, id: &str, patch: UpdatePostRequest) -> Result<(), StoreError>;
    async fn delete_one(&self, id: &str) -> Result<(), StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const PREVIEW_COLUMNS: &str = "id, title, description, tags, is_public, time, read_time, author";
const POST_COLUMNS: &str =
    "id, title, description, tags, post, is_public, time, read_time, author";

/// PostgresRepository
///
/// `Repository` backed by the `posts` table in PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations under `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_all(&self) -> Result<Vec<Post>, StoreError> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY time DESC, id");
        let posts = sqlx::query_as::<_, Post>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn find_all_previews(&self) -> Result<Vec<PostPreview>, StoreError> {
        let query = format!("SELECT {PREVIEW_COLUMNS} FROM posts ORDER BY time DESC, id");
        let previews = sqlx::query_as::<_, PostPreview>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(previews)
    }

    /// find_visible_previews
    ///
    /// Pushes the visibility rule and tag membership into the query so only admitted
    /// rows leave the database. Uses QueryBuilder for safe parameterization.
    async fn find_visible_previews(
        &self,
        scope: &ViewScope,
        tag: Option<&str>,
    ) -> Result<Vec<PostPreview>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {PREVIEW_COLUMNS} FROM posts WHERE TRUE"));

        match scope {
            ViewScope::Unrestricted => {}
            ViewScope::PublicOnly => {
                builder.push(" AND is_public = true");
            }
            ViewScope::OwnerOrPublic(username) => {
                // `author_key` holds `normalize_name(author)`, written on insert.
                builder.push(" AND (is_public = true OR author_key = ");
                builder.push_bind(username.clone());
                builder.push(")");
            }
        }

        if let Some(tag) = tag {
            builder.push(" AND ");
            builder.push_bind(tag.to_string());
            builder.push(" = ANY(tags)");
        }

        builder.push(" ORDER BY time DESC, id");

        let previews = builder
            .build_query_as::<PostPreview>()
            .fetch_all(&self.pool)
            .await?;
        Ok(previews)
    }

    async fn find_one(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn insert(&self, post: Post) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, title, description, tags, post, is_public, time, read_time, author, author_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.tags)
        .bind(&post.post)
        .bind(post.is_public)
        .bind(post.time)
        .bind(post.read_time)
        .bind(&post.author)
        .bind(normalize_name(&post.author))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(post.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// update_one
    ///
    /// Uses `COALESCE` so a `None` field keeps the stored column value.
    async fn update_one(&self, id: &str, patch: UpdatePostRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                tags = COALESCE($4, tags),
                post = COALESCE($5, post),
                is_public = COALESCE($6, is_public),
                time = COALESCE($7, time),
                read_time = COALESCE($8, read_time)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.tags)
        .bind(patch.post)
        .bind(patch.is_public)
        .bind(patch.time)
        .bind(patch.read_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// MemoryRepository
///
/// In-process `Repository` used by the test suite and by local runs without a
/// `DATABASE_URL`. Preserves insertion order.
#[derive(Default)]
pub struct MemoryRepository {
    posts: RwLock<Vec<Post>>,
    /// When true, every operation returns a simulated store failure.
    pub should_fail: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: RwLock::new(posts),
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            posts: RwLock::default(),
            should_fail: true,
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable(
                "Mock Store Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_all(&self) -> Result<Vec<Post>, StoreError> {
        self.check()?;
        Ok(self.posts.read().await.clone())
    }

    async fn find_all_previews(&self) -> Result<Vec<PostPreview>, StoreError> {
        self.check()?;
        let posts = self.posts.read().await;
        Ok(posts.iter().cloned().map(PostPreview::from).collect())
    }

    async fn find_one(&self, id: &str) -> Result<Option<Post>, StoreError> {
        self.check()?;
        let posts = self.posts.read().await;
        Ok(posts.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, post: Post) -> Result<(), StoreError> {
        self.check()?;
        let mut posts = self.posts.write().await;
        if posts.iter().any(|p| p.id == post.id) {
            return Err(StoreError::Duplicate(post.id));
        }
        posts.push(post);
        Ok(())
    }

    async fn update_one(&self, id: &str, patch: UpdatePostRequest) -> Result<(), StoreError> {
        self.check()?;
        let mut posts = self.posts.write().await;
        if let Some(post) = posts.iter_mut().find(|p| p.id == id) {
            patch.apply_to(post);
        }
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.posts.write().await.retain(|p| p.id != id);
        Ok(())
    }
}

/// TimeoutRepository
///
/// Decorator bounding every call on the wrapped repository by `timeout`. An elapsed
/// call surfaces as `StoreError::Timeout`; nothing is retried.
pub struct TimeoutRepository {
    inner: RepositoryState,
    timeout: Duration,
}

impl TimeoutRepository {
    pub fn new(inner: RepositoryState, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.timeout)))
    }
}

#[async_trait]
impl Repository for TimeoutRepository {
    async fn find_all(&self) -> Result<Vec<Post>, StoreError> {
        self.bounded(self.inner.find_all()).await
    }

    async fn find_all_previews(&self) -> Result<Vec<PostPreview>, StoreError> {
        self.bounded(self.inner.find_all_previews()).await
    }

    async fn find_visible_previews(
        &self,
        scope: &ViewScope,
        tag: Option<&str>,
    ) -> Result<Vec<PostPreview>, StoreError> {
        self.bounded(self.inner.find_visible_previews(scope, tag))
            .await
    }

    async fn find_one(&self, id: &str) -> Result<Option<Post>, StoreError> {
        self.bounded(self.inner.find_one(id)).await
    }

    async fn insert(&self, post: Post) -> Result<(), StoreError> {
        self.bounded(self.inner.insert(post)).await
    }

    async fn update_one(&self, id: &str, patch: UpdatePostRequest) -> Result<(), StoreError> {
        self.bounded(self.inner.update_one(id, patch)).await
    }

    async fn delete_one(&self, id: &str) -> Result<(), StoreError> {
        self.bounded(self.inner.delete_one(id)).await
    }
}

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{Post, PostPreview},
};

/// Role code that grants unrestricted read access.
pub const ELEVATED_ROLE: i32 = 0;

/// Normalizes a username or author for ownership comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// ViewScope
///
/// The three-tier read policy, resolved once per request from the caller context.
/// Both the in-process filter and the SQL pushdown in the Postgres repository are
/// driven by this value. The Postgres store compares against an `author_key` column
/// computed with `normalize_name` at insert time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewScope {
    /// Anonymous caller: public posts only.
    PublicOnly,
    /// Ordinary caller: public posts plus the caller's own. Holds the normalized username.
    OwnerOrPublic(String),
    /// Caller holding the elevated role: everything.
    Unrestricted,
}

impl ViewScope {
    pub fn for_caller(caller: Option<&AuthUser>) -> Self {
        match caller {
            None => ViewScope::PublicOnly,
            Some(user) if user.is_elevated() => ViewScope::Unrestricted,
            Some(user) => ViewScope::OwnerOrPublic(normalize_name(&user.username)),
        }
    }

    pub fn admits(&self, is_public: bool, author: &str) -> bool {
        match self {
            ViewScope::Unrestricted => true,
            ViewScope::PublicOnly => is_public,
            ViewScope::OwnerOrPublic(username) => is_public || normalize_name(author) == *username,
        }
    }
}

/// Applies the visibility rule and, when given, exact tag membership.
pub fn filter_previews(
    previews: Vec<PostPreview>,
    scope: &ViewScope,
    tag: Option<&str>,
) -> Vec<PostPreview> {
    previews
        .into_iter()
        .filter(|p| scope.admits(p.is_public, &p.author))
        .filter(|p| tag.is_none_or(|tag| p.tags.iter().any(|t| t == tag)))
        .collect()
}

/// authorize_read
///
/// Single-post read check. Public posts are open to everyone. A private post needs a
/// caller, and that caller must hold the elevated role or be the post's author.
pub fn authorize_read(post: &Post, caller: Option<&AuthUser>) -> Result<(), ApiError> {
    if post.is_public {
        return Ok(());
    }
    let user = caller.ok_or_else(|| ApiError::Unauthenticated("No login".to_string()))?;
    if !user.is_elevated() && !user.owns(post) {
        return Err(ApiError::Unauthorized("Unauthorize".to_string()));
    }
    Ok(())
}

//! Repository traits describing persistence adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::entities::{PostRecord, TagRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Narrowing applied to post listings. Both criteria combine with AND.
#[derive(Debug, Clone, Default)]
pub struct PostQueryFilter {
    /// Case-insensitive substring matched against title or body.
    pub search: Option<String>,
    pub tag: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateTagParams {
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct UpdateTagParams {
    pub id: Uuid,
    pub title: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError>;

    /// Posts matching `filter`, newest first.
    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Inserts the post and its tag associations atomically.
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Rewrites title, body and the full tag set atomically. Slug and
    /// creation time are left untouched.
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn list_all(&self) -> Result<Vec<TagRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TagRecord>, RepoError>;
}

#[async_trait]
pub trait TagsWriteRepo: Send + Sync {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError>;

    async fn update_tag(&self, params: UpdateTagParams) -> Result<TagRecord, RepoError>;

    /// Removes the tag and its associations; tagged posts are kept.
    async fn delete_tag(&self, id: Uuid) -> Result<(), RepoError>;
}

/// The post/tag association table.
#[async_trait]
pub trait PostTagsRepo: Send + Sync {
    /// Links a post to a tag. Linking an existing pair is a no-op.
    async fn attach(&self, post_id: Uuid, tag_id: Uuid) -> Result<(), RepoError>;

    async fn detach(&self, post_id: Uuid, tag_id: Uuid) -> Result<(), RepoError>;

    /// Tags of a post ordered by title.
    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;

    /// Posts carrying a tag, newest first.
    async fn list_by_tag(&self, tag_id: Uuid) -> Result<Vec<PostRecord>, RepoError>;

    /// Replaces the whole tag set of a post in one transaction.
    async fn replace_for_post(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError>;

    /// Batch variant of [`PostTagsRepo::list_by_post`]. Posts without tags
    /// are absent from the map.
    async fn list_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TagRecord>>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}

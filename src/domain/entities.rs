//! Domain entities mirrored from persistent storage.

use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

pub const POST_TITLE_MAX_LEN: usize = 150;
pub const POST_SLUG_MAX_LEN: usize = 150;
pub const TAG_TITLE_MAX_LEN: usize = 50;
pub const TAG_SLUG_MAX_LEN: usize = 50;

/// Post slugs that would be shadowed by a static route under `/post/`.
pub const RESERVED_POST_SLUGS: &[&str] = &["create"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

impl PostRecord {
    pub fn absolute_url(&self) -> String {
        post_url(&self.slug)
    }
}

impl fmt::Display for PostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
}

impl TagRecord {
    pub fn absolute_url(&self) -> String {
        tag_url(&self.slug)
    }
}

impl fmt::Display for TagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

pub fn post_url(slug: &str) -> String {
    format!("/post/{slug}/")
}

pub fn tag_url(slug: &str) -> String {
    format!("/tag/{slug}/")
}

//! In-process repository backend.
//!
//! Used when no database URL is configured and throughout the test suite.
//! A single `RwLock` guards the whole store so every repository call is
//! atomic, mirroring the transactional guarantees of the PostgreSQL backend.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreatePostParams, CreateTagParams, HealthRepo, PostQueryFilter, PostTagsRepo, PostsRepo,
    PostsWriteRepo, RepoError, TagsRepo, TagsWriteRepo, UpdatePostParams, UpdateTagParams,
};
use crate::domain::entities::{PostRecord, TagRecord};

const POSTS_SLUG_CONSTRAINT: &str = "posts_slug_key";
const TAGS_SLUG_CONSTRAINT: &str = "tags_slug_key";

#[derive(Debug, Clone)]
struct StoredPost {
    seq: u64,
    record: PostRecord,
}

#[derive(Debug, Default)]
struct MemoryState {
    posts: Vec<StoredPost>,
    tags: Vec<TagRecord>,
    /// (post_id, tag_id) pairs.
    links: BTreeSet<(Uuid, Uuid)>,
    next_seq: u64,
}

impl MemoryState {
    fn post(&self, id: Uuid) -> Option<&StoredPost> {
        self.posts.iter().find(|stored| stored.record.id == id)
    }

    fn tag(&self, id: Uuid) -> Option<&TagRecord> {
        self.tags.iter().find(|tag| tag.id == id)
    }

    fn ensure_tags_exist(&self, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        match tag_ids.iter().find(|id| self.tag(**id).is_none()) {
            Some(missing) => Err(RepoError::InvalidInput {
                message: format!("tag `{missing}` does not exist"),
            }),
            None => Ok(()),
        }
    }

    fn replace_links(&mut self, post_id: Uuid, tag_ids: &[Uuid]) {
        self.links.retain(|(post, _)| *post != post_id);
        self.links
            .extend(tag_ids.iter().map(|tag_id| (post_id, *tag_id)));
    }

    fn tags_of(&self, post_id: Uuid) -> Vec<TagRecord> {
        let mut tags: Vec<TagRecord> = self
            .links
            .iter()
            .filter(|(post, _)| *post == post_id)
            .filter_map(|(_, tag_id)| self.tag(*tag_id).cloned())
            .collect();
        sort_tags(&mut tags);
        tags
    }

    fn matching_posts(&self, filter: &PostQueryFilter) -> Vec<&StoredPost> {
        let needle = filter
            .search
            .as_deref()
            .map(str::to_lowercase)
            .filter(|needle| !needle.is_empty());

        let mut matches: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|stored| match filter.tag {
                Some(tag_id) => self.links.contains(&(stored.record.id, tag_id)),
                None => true,
            })
            .filter(|stored| match &needle {
                Some(needle) => {
                    stored.record.title.to_lowercase().contains(needle)
                        || stored.record.body.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect();
        sort_posts(&mut matches);
        matches
    }
}

fn sort_posts(posts: &mut [&StoredPost]) {
    posts.sort_by(|a, b| {
        b.record
            .created_at
            .cmp(&a.record.created_at)
            .then(b.seq.cmp(&a.seq))
    });
}

fn sort_tags(tags: &mut [TagRecord]) {
    tags.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.slug.cmp(&b.slug)));
}

fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepositories {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state.matching_posts(filter).len() as u64)
    }

    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        Ok(state
            .matching_posts(filter)
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .find(|stored| stored.record.slug == slug)
            .map(|stored| stored.record.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.post(id).map(|stored| stored.record.clone()))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        if state
            .posts
            .iter()
            .any(|stored| stored.record.slug == params.slug)
        {
            return Err(RepoError::Duplicate {
                constraint: POSTS_SLUG_CONSTRAINT.to_string(),
            });
        }
        let tag_ids = dedup_ids(&params.tag_ids);
        state.ensure_tags_exist(&tag_ids)?;

        let record = PostRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            body: params.body,
            created_at: OffsetDateTime::now_utc(),
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        state.posts.push(StoredPost {
            seq,
            record: record.clone(),
        });
        state.replace_links(record.id, &tag_ids);

        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        let tag_ids = dedup_ids(&params.tag_ids);
        state.ensure_tags_exist(&tag_ids)?;

        let stored = state
            .posts
            .iter_mut()
            .find(|stored| stored.record.id == params.id)
            .ok_or(RepoError::NotFound)?;
        stored.record.title = params.title;
        stored.record.body = params.body;
        let record = stored.record.clone();

        state.replace_links(record.id, &tag_ids);
        Ok(record)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let before = state.posts.len();
        state.posts.retain(|stored| stored.record.id != id);
        if state.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        state.links.retain(|(post, _)| *post != id);
        Ok(())
    }
}

#[async_trait]
impl TagsRepo for MemoryRepositories {
    async fn list_all(&self) -> Result<Vec<TagRecord>, RepoError> {
        let state = self.state.read().await;
        let mut tags = state.tags.clone();
        sort_tags(&mut tags);
        Ok(tags)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.tags.iter().find(|tag| tag.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TagRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.tag(id).cloned())
    }
}

#[async_trait]
impl TagsWriteRepo for MemoryRepositories {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let mut state = self.state.write().await;
        if state.tags.iter().any(|tag| tag.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: TAGS_SLUG_CONSTRAINT.to_string(),
            });
        }

        let tag = TagRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn update_tag(&self, params: UpdateTagParams) -> Result<TagRecord, RepoError> {
        let mut state = self.state.write().await;
        let tag = state
            .tags
            .iter_mut()
            .find(|tag| tag.id == params.id)
            .ok_or(RepoError::NotFound)?;
        tag.title = params.title;
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let before = state.tags.len();
        state.tags.retain(|tag| tag.id != id);
        if state.tags.len() == before {
            return Err(RepoError::NotFound);
        }
        state.links.retain(|(_, tag)| *tag != id);
        Ok(())
    }
}

#[async_trait]
impl PostTagsRepo for MemoryRepositories {
    async fn attach(&self, post_id: Uuid, tag_id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.post(post_id).is_none() {
            return Err(RepoError::InvalidInput {
                message: format!("post `{post_id}` does not exist"),
            });
        }
        state.ensure_tags_exist(&[tag_id])?;
        state.links.insert((post_id, tag_id));
        Ok(())
    }

    async fn detach(&self, post_id: Uuid, tag_id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.links.remove(&(post_id, tag_id));
        Ok(())
    }

    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.tags_of(post_id))
    }

    async fn list_by_tag(&self, tag_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let filter = PostQueryFilter {
            search: None,
            tag: Some(tag_id),
        };
        Ok(state
            .matching_posts(&filter)
            .into_iter()
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn replace_for_post(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.post(post_id).is_none() {
            return Err(RepoError::NotFound);
        }
        let tag_ids = dedup_ids(tag_ids);
        state.ensure_tags_exist(&tag_ids)?;
        state.replace_links(post_id, &tag_ids);
        Ok(())
    }

    async fn list_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TagRecord>>, RepoError> {
        let state = self.state.read().await;
        Ok(post_ids
            .iter()
            .map(|post_id| (*post_id, state.tags_of(*post_id)))
            .filter(|(_, tags)| !tags.is_empty())
            .collect())
    }
}

#[async_trait]
impl HealthRepo for MemoryRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_post(repos: &MemoryRepositories, slug: &str, body: &str) -> PostRecord {
        repos
            .create_post(CreatePostParams {
                slug: slug.to_string(),
                title: slug.to_string(),
                body: body.to_string(),
                tag_ids: Vec::new(),
            })
            .await
            .expect("post")
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_windowed() {
        let repos = MemoryRepositories::new();
        for slug in ["a", "b", "c"] {
            seed_post(&repos, slug, "").await;
        }

        let filter = PostQueryFilter::default();
        let slugs: Vec<String> = repos
            .list_posts(&filter, PageRequest { offset: 1, limit: 5 })
            .await
            .expect("list")
            .into_iter()
            .map(|post| post.slug)
            .collect();
        assert_eq!(slugs, vec!["b", "a"]);
        assert_eq!(repos.count_posts(&filter).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn search_matches_literal_substrings() {
        let repos = MemoryRepositories::new();
        seed_post(&repos, "percent", "100% done").await;
        seed_post(&repos, "plain", "1000 done").await;

        let filter = PostQueryFilter {
            search: Some("0%".into()),
            tag: None,
        };
        assert_eq!(repos.count_posts(&filter).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn duplicate_slugs_are_rejected() {
        let repos = MemoryRepositories::new();
        seed_post(&repos, "same", "").await;
        let err = repos
            .create_post(CreatePostParams {
                slug: "same".into(),
                title: "again".into(),
                body: String::new(),
                tag_ids: Vec::new(),
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { constraint } if constraint == "posts_slug_key"));
    }

    #[tokio::test]
    async fn unknown_tag_ids_are_invalid_input() {
        let repos = MemoryRepositories::new();
        let err = repos
            .create_post(CreatePostParams {
                slug: "p".into(),
                title: "p".into(),
                body: String::new(),
                tag_ids: vec![Uuid::new_v4()],
            })
            .await
            .expect_err("dangling tag");
        assert!(matches!(err, RepoError::InvalidInput { .. }));
        assert!(
            PostsRepo::find_by_slug(&repos, "p")
                .await
                .expect("lookup")
                .is_none()
        );
    }
}

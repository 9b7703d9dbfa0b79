use std::sync::Arc;

use uuid::Uuid;

use crate::application::audit::{Action, Entity, record_mutation};
use crate::application::error::ContentError;
use crate::application::pagination::{Page, PageSelector, Paginator};
use crate::application::repos::{
    CreatePostParams, PostQueryFilter, PostTagsRepo, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::{POST_SLUG_MAX_LEN, PostRecord, RESERVED_POST_SLUGS, TagRecord};
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug};

/// A post together with its tags, ordered by title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEntry {
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    /// Explicit slug; derived from the title when absent.
    pub slug: Option<String>,
    pub title: String,
    pub body: String,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub title: String,
    pub body: String,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    post_tags: Arc<dyn PostTagsRepo>,
    paginator: Paginator,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        post_tags: Arc<dyn PostTagsRepo>,
        paginator: Paginator,
    ) -> Self {
        Self {
            reader,
            writer,
            post_tags,
            paginator,
        }
    }

    /// Newest-first listing, optionally narrowed by a search query.
    pub async fn list(
        &self,
        search: Option<&str>,
        selector: PageSelector,
    ) -> Result<Page<PostEntry>, ContentError> {
        let filter = PostQueryFilter {
            search: search
                .map(str::trim)
                .filter(|query| !query.is_empty())
                .map(str::to_string),
            tag: None,
        };
        self.page(&filter, selector).await
    }

    pub async fn list_for_tag(
        &self,
        tag: &TagRecord,
        selector: PageSelector,
    ) -> Result<Page<PostEntry>, ContentError> {
        let filter = PostQueryFilter {
            search: None,
            tag: Some(tag.id),
        };
        self.page(&filter, selector).await
    }

    pub async fn find(&self, slug: &str) -> Result<PostEntry, ContentError> {
        let post = self.require(slug).await?;
        let tags = self.post_tags.list_by_post(post.id).await?;
        Ok(PostEntry { post, tags })
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreatePostCommand,
    ) -> Result<PostRecord, ContentError> {
        let slug = match command.slug {
            Some(slug) => {
                validate_slug(&slug, POST_SLUG_MAX_LEN)?;
                if RESERVED_POST_SLUGS.contains(&slug.as_str()) {
                    return Err(ContentError::invalid(
                        "slug",
                        format!("`{slug}` is reserved"),
                    ));
                }
                slug
            }
            None => self.derive_slug(&command.title).await?,
        };

        let post = self
            .writer
            .create_post(CreatePostParams {
                slug,
                title: command.title,
                body: command.body,
                tag_ids: command.tag_ids,
            })
            .await?;

        record_mutation(actor, Entity::Post, Action::Create, &post.slug);
        Ok(post)
    }

    pub async fn update(
        &self,
        actor: &str,
        slug: &str,
        command: UpdatePostCommand,
    ) -> Result<PostRecord, ContentError> {
        let existing = self.require(slug).await?;

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: existing.id,
                title: command.title,
                body: command.body,
                tag_ids: command.tag_ids,
            })
            .await
            .map_err(not_found_as_content)?;

        record_mutation(actor, Entity::Post, Action::Update, &post.slug);
        Ok(post)
    }

    pub async fn delete(&self, actor: &str, slug: &str) -> Result<(), ContentError> {
        let existing = self.require(slug).await?;
        self.writer
            .delete_post(existing.id)
            .await
            .map_err(not_found_as_content)?;

        record_mutation(actor, Entity::Post, Action::Delete, &existing.slug);
        Ok(())
    }

    async fn require(&self, slug: &str) -> Result<PostRecord, ContentError> {
        self.reader
            .find_by_slug(slug)
            .await?
            .ok_or(ContentError::NotFound { entity: "post" })
    }

    async fn page(
        &self,
        filter: &PostQueryFilter,
        selector: PageSelector,
    ) -> Result<Page<PostEntry>, ContentError> {
        let total = self.reader.count_posts(filter).await?;
        let window = self.paginator.resolve(selector, total)?;
        let posts = self.reader.list_posts(filter, window.request).await?;

        let ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();
        let mut tags = self.post_tags.list_for_posts(&ids).await?;

        let entries = posts
            .into_iter()
            .map(|post| {
                let tags = tags.remove(&post.id).unwrap_or_default();
                PostEntry { post, tags }
            })
            .collect();

        Ok(Page::new(window, entries, total))
    }

    async fn derive_slug(&self, title: &str) -> Result<String, ContentError> {
        let reader = self.reader.clone();
        let result = generate_unique_slug_async(title, POST_SLUG_MAX_LEN, move |candidate| {
            let reader = reader.clone();
            let candidate = candidate.to_string();
            async move {
                if RESERVED_POST_SLUGS.contains(&candidate.as_str()) {
                    return Ok(false);
                }
                reader
                    .find_by_slug(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await;

        slug_result(result)
    }
}

/// Translate slug derivation failures into title-level validation errors.
pub(crate) fn slug_result(
    result: Result<String, SlugAsyncError<RepoError>>,
) -> Result<String, ContentError> {
    match result {
        Ok(slug) => Ok(slug),
        Err(SlugAsyncError::Slug(SlugError::EmptyInput | SlugError::Unrepresentable { .. })) => {
            Err(ContentError::invalid(
                "title",
                "Title must contain at least one letter or digit.",
            ))
        }
        Err(SlugAsyncError::Slug(SlugError::Exhausted { .. })) => Err(ContentError::invalid(
            "title",
            "Too many entries share this title; choose a different one.",
        )),
        Err(SlugAsyncError::Predicate(err)) => Err(ContentError::Repo(err)),
    }
}

pub(crate) fn not_found_as_content(err: RepoError) -> ContentError {
    match err {
        RepoError::NotFound => ContentError::NotFound { entity: "post" },
        other => ContentError::Repo(other),
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::application::repos::{CreateTagParams, TagsWriteRepo};
    use crate::infra::memory::MemoryRepositories;

    fn service(repos: &Arc<MemoryRepositories>) -> PostService {
        PostService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            Paginator::new(NonZeroU32::new(2).expect("non-zero")),
        )
    }

    fn command(title: &str, body: &str) -> CreatePostCommand {
        CreatePostCommand {
            slug: None,
            title: title.to_string(),
            body: body.to_string(),
            tag_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_round_trips() {
        let repos = Arc::new(MemoryRepositories::new());
        let posts = service(&repos);

        let post = posts
            .create("admin", command("New title", "New text"))
            .await
            .expect("create");
        assert_eq!(post.slug, "new-title");

        let entry = posts.find("new-title").await.expect("find");
        assert_eq!(entry.post.title, "New title");
        assert_eq!(entry.post.body, "New text");
    }

    #[tokio::test]
    async fn derived_slug_collisions_get_suffix() {
        let repos = Arc::new(MemoryRepositories::new());
        let posts = service(&repos);

        posts.create("admin", command("Same", "")).await.expect("first");
        let second = posts.create("admin", command("Same", "")).await.expect("second");
        assert_eq!(second.slug, "same-2");
    }

    #[tokio::test]
    async fn derived_slug_skips_reserved_words() {
        let repos = Arc::new(MemoryRepositories::new());
        let post = service(&repos)
            .create("admin", command("Create", ""))
            .await
            .expect("create");
        assert_eq!(post.slug, "create-2");
    }

    #[tokio::test]
    async fn explicit_slug_collision_is_a_conflict() {
        let repos = Arc::new(MemoryRepositories::new());
        let posts = service(&repos);
        let explicit = CreatePostCommand {
            slug: Some("new_post1".to_string()),
            ..command("Post", "")
        };

        posts.create("admin", explicit.clone()).await.expect("first");
        let err = posts.create("admin", explicit).await.expect_err("duplicate");
        assert!(matches!(
            err,
            ContentError::Repo(RepoError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn explicit_reserved_or_malformed_slug_is_invalid() {
        let repos = Arc::new(MemoryRepositories::new());
        let posts = service(&repos);

        for slug in ["create", "Not A Slug"] {
            let err = posts
                .create(
                    "admin",
                    CreatePostCommand {
                        slug: Some(slug.to_string()),
                        ..command("Post", "")
                    },
                )
                .await
                .expect_err("invalid slug");
            assert!(matches!(err, ContentError::Invalid { field: "slug", .. }));
        }
    }

    #[tokio::test]
    async fn symbol_only_title_is_a_title_error() {
        let repos = Arc::new(MemoryRepositories::new());
        let err = service(&repos)
            .create("admin", command("!!!", ""))
            .await
            .expect_err("no slug characters");
        assert!(matches!(err, ContentError::Invalid { field: "title", .. }));
    }

    #[tokio::test]
    async fn update_keeps_slug_and_replaces_tags() {
        let repos = Arc::new(MemoryRepositories::new());
        let posts = service(&repos);
        let python = repos
            .create_tag(CreateTagParams {
                slug: "python".into(),
                title: "python".into(),
            })
            .await
            .expect("tag");

        posts
            .create(
                "admin",
                CreatePostCommand {
                    tag_ids: vec![python.id],
                    ..command("Original", "body")
                },
            )
            .await
            .expect("create");

        let updated = posts
            .update(
                "admin",
                "original",
                UpdatePostCommand {
                    title: "Renamed".into(),
                    body: "new body".into(),
                    tag_ids: Vec::new(),
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.slug, "original");
        assert_eq!(updated.title, "Renamed");

        let entry = posts.find("original").await.expect("find");
        assert!(entry.tags.is_empty());
    }

    #[tokio::test]
    async fn list_searches_body_and_paginates() {
        let repos = Arc::new(MemoryRepositories::new());
        let posts = service(&repos);
        for (title, body) in [
            ("One", "alpha"),
            ("Two", "needle in body"),
            ("Three", "gamma"),
        ] {
            posts.create("admin", command(title, body)).await.expect("create");
        }

        let page = posts
            .list(Some("NEEDLE"), PageSelector::default())
            .await
            .expect("search");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].post.title, "Two");

        let empty = posts
            .list(Some("absent"), PageSelector::default())
            .await
            .expect("empty search");
        assert!(empty.items.is_empty());

        let first = posts.list(None, PageSelector::default()).await.expect("page 1");
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.items[0].post.title, "Three");

        let err = posts
            .list(None, PageSelector::Number(3))
            .await
            .expect_err("past the end");
        assert!(matches!(err, ContentError::Pagination(_)));
    }

    #[tokio::test]
    async fn missing_posts_are_not_found() {
        let repos = Arc::new(MemoryRepositories::new());
        let posts = service(&repos);
        assert!(matches!(
            posts.find("nope").await,
            Err(ContentError::NotFound { entity: "post" })
        ));
        assert!(matches!(
            posts.delete("admin", "nope").await,
            Err(ContentError::NotFound { .. })
        ));
    }
}

use std::sync::Arc;

use tracing::debug;

use crate::application::audit::{Action, Entity, record_mutation};
use crate::application::error::ContentError;
use crate::application::posts::slug_result;
use crate::application::repos::{
    CreateTagParams, PostTagsRepo, RepoError, TagsRepo, TagsWriteRepo, UpdateTagParams,
};
use crate::domain::entities::{TAG_SLUG_MAX_LEN, TagRecord};
use crate::domain::slug::{generate_unique_slug_async, validate_slug};

#[derive(Debug, Clone)]
pub struct CreateTagCommand {
    pub slug: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct UpdateTagCommand {
    pub title: String,
}

#[derive(Clone)]
pub struct TagService {
    reader: Arc<dyn TagsRepo>,
    writer: Arc<dyn TagsWriteRepo>,
    post_tags: Arc<dyn PostTagsRepo>,
}

impl TagService {
    pub fn new(
        reader: Arc<dyn TagsRepo>,
        writer: Arc<dyn TagsWriteRepo>,
        post_tags: Arc<dyn PostTagsRepo>,
    ) -> Self {
        Self {
            reader,
            writer,
            post_tags,
        }
    }

    /// All tags ordered by title.
    pub async fn list_all(&self) -> Result<Vec<TagRecord>, ContentError> {
        self.reader.list_all().await.map_err(ContentError::from)
    }

    pub async fn find(&self, slug: &str) -> Result<TagRecord, ContentError> {
        self.reader
            .find_by_slug(slug)
            .await?
            .ok_or(ContentError::NotFound { entity: "tag" })
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreateTagCommand,
    ) -> Result<TagRecord, ContentError> {
        let slug = match command.slug {
            Some(slug) => {
                validate_slug(&slug, TAG_SLUG_MAX_LEN)?;
                slug
            }
            None => {
                let reader = self.reader.clone();
                let result =
                    generate_unique_slug_async(&command.title, TAG_SLUG_MAX_LEN, move |candidate| {
                        let reader = reader.clone();
                        let candidate = candidate.to_string();
                        async move {
                            reader
                                .find_by_slug(&candidate)
                                .await
                                .map(|existing| existing.is_none())
                        }
                    })
                    .await;
                slug_result(result)?
            }
        };

        let tag = self
            .writer
            .create_tag(CreateTagParams {
                slug,
                title: command.title,
            })
            .await?;

        record_mutation(actor, Entity::Tag, Action::Create, &tag.slug);
        Ok(tag)
    }

    pub async fn update(
        &self,
        actor: &str,
        slug: &str,
        command: UpdateTagCommand,
    ) -> Result<TagRecord, ContentError> {
        let existing = self.find(slug).await?;
        let tag = self
            .writer
            .update_tag(UpdateTagParams {
                id: existing.id,
                title: command.title,
            })
            .await
            .map_err(tag_not_found)?;

        record_mutation(actor, Entity::Tag, Action::Update, &tag.slug);
        Ok(tag)
    }

    /// Deletes the tag and its associations. Tagged posts are kept.
    pub async fn delete(&self, actor: &str, slug: &str) -> Result<(), ContentError> {
        let existing = self.find(slug).await?;
        let detached = self.post_tags.list_by_tag(existing.id).await?.len();

        self.writer
            .delete_tag(existing.id)
            .await
            .map_err(tag_not_found)?;

        debug!(
            target = "quire::application::tags",
            slug = %existing.slug,
            detached,
            "tag associations removed"
        );
        record_mutation(actor, Entity::Tag, Action::Delete, &existing.slug);
        Ok(())
    }
}

fn tag_not_found(err: RepoError) -> ContentError {
    match err {
        RepoError::NotFound => ContentError::NotFound { entity: "tag" },
        other => ContentError::Repo(other),
    }
}

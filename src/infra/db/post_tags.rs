use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::application::repos::{PostTagsRepo, RepoError};
use crate::domain::entities::{PostRecord, TagRecord};

use super::posts::{POST_COLUMNS, PostRow};
use super::tags::TagRow;
use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: Uuid,
    #[sqlx(flatten)]
    tag: TagRow,
}

/// Replace the tag set of `post_id` inside an open transaction.
pub(super) async fn write_post_tags(
    tx: &mut Transaction<'_, Postgres>,
    post_id: Uuid,
    tag_ids: &[Uuid],
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        DELETE FROM post_tags
        WHERE post_id = $1
        "#,
    )
    .bind(post_id)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    if !tag_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO post_tags (post_id, tag_id)
            SELECT DISTINCT $1, id
            FROM UNNEST($2::uuid[]) AS id
            "#,
        )
        .bind(post_id)
        .bind(tag_ids)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    }

    Ok(())
}

#[async_trait]
impl PostTagsRepo for PostgresRepositories {
    async fn attach(&self, post_id: Uuid, tag_id: Uuid) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO post_tags (post_id, tag_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn detach(&self, post_id: Uuid, tag_id: Uuid) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            DELETE FROM post_tags
            WHERE post_id = $1 AND tag_id = $2
            "#,
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT t.id, t.slug, t.title
            FROM tags t
            INNER JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = $1
            ORDER BY t.title, t.slug
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    async fn list_by_tag(&self, tag_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             INNER JOIN post_tags pt ON pt.post_id = p.id \
             WHERE pt.tag_id = $1 \
             ORDER BY p.created_at DESC, p.id DESC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(tag_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn replace_for_post(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if !exists {
            return Err(RepoError::NotFound);
        }

        write_post_tags(&mut tx, post_id, tag_ids).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TagRecord>>, RepoError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, PostTagRow>(
            r#"
            SELECT pt.post_id, t.id, t.slug, t.title
            FROM post_tags pt
            INNER JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id = ANY($1)
            ORDER BY t.title, t.slug
            "#,
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut grouped: HashMap<Uuid, Vec<TagRecord>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.post_id)
                .or_default()
                .push(TagRecord::from(row.tag));
        }

        Ok(grouped)
    }
}

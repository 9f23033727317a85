//! `PostgreSQL` implementation of the `CommentRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use postwall_core::error::DomainError;
use postwall_post_query::domain::entities::CommentEntity;
use postwall_post_query::domain::repositories::CommentRepository;

use crate::pg_post_repository::infrastructure;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CommentRow {
    comment_id: Uuid,
    post_id: Uuid,
    username: String,
    comment_date: DateTime<Utc>,
    comment: String,
    edited: bool,
}

impl From<CommentRow> for CommentEntity {
    fn from(row: CommentRow) -> Self {
        Self {
            comment_id: row.comment_id,
            post_id: row.post_id,
            username: row.username,
            comment_date: row.comment_date,
            comment: row.comment,
            edited: row.edited,
        }
    }
}

/// PostgreSQL-backed comment repository.
#[derive(Debug, Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    /// Creates a new `PgCommentRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    #[instrument(skip(self, comment), fields(comment_id = %comment.comment_id))]
    async fn create(&self, comment: &CommentEntity) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            INSERT INTO comments (comment_id, post_id, username, comment_date, comment, edited)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (comment_id) DO NOTHING
            ",
        )
        .bind(comment.comment_id)
        .bind(comment.post_id)
        .bind(&comment.username)
        .bind(comment.comment_date)
        .bind(&comment.comment)
        .bind(comment.edited)
        .execute(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_by_id(&self, comment_id: Uuid) -> Result<Option<CommentEntity>, DomainError> {
        let row: Option<CommentRow> = sqlx::query_as(
            r"
            SELECT comment_id, post_id, username, comment_date, comment, edited
            FROM comments
            WHERE comment_id = $1
            ",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;
        Ok(row.map(CommentEntity::from))
    }

    #[instrument(skip(self, comment), fields(comment_id = %comment.comment_id))]
    async fn update(&self, comment: &CommentEntity) -> Result<(), DomainError> {
        sqlx::query(
            r"
            UPDATE comments
            SET username = $2, comment_date = $3, comment = $4, edited = $5
            WHERE comment_id = $1
            ",
        )
        .bind(comment.comment_id)
        .bind(&comment.username)
        .bind(comment.comment_date)
        .bind(&comment.comment)
        .bind(comment.edited)
        .execute(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, comment_id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM comments WHERE comment_id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| infrastructure(&e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_post(&self, post_id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(|e| infrastructure(&e))?;
        Ok(())
    }
}

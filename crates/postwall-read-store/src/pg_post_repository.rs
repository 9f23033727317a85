//! `PostgreSQL` implementation of the `PostRepository` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use postwall_core::error::DomainError;
use postwall_post_query::domain::entities::{CommentEntity, PostEntity};
use postwall_post_query::domain::repositories::PostRepository;

use crate::pg_comment_repository::CommentRow;

const SELECT_POSTS: &str = r"
    SELECT p.post_id, p.author, p.date_posted, p.message, p.likes, p.version
    FROM posts p
";

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    post_id: Uuid,
    author: String,
    date_posted: DateTime<Utc>,
    message: String,
    likes: i32,
    version: i64,
}

pub(crate) fn infrastructure(err: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// PostgreSQL-backed post repository. Reads attach each post's comments;
/// removed posts are remembered in `removed_posts`.
#[derive(Debug, Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    /// Creates a new `PgPostRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the comments of `rows` in one query and assembles entities,
    /// keeping the row order.
    async fn hydrate(&self, rows: Vec<PostRow>) -> Result<Vec<PostEntity>, DomainError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.post_id).collect();
        let comment_rows: Vec<CommentRow> = sqlx::query_as(
            r"
            SELECT comment_id, post_id, username, comment_date, comment, edited
            FROM comments
            WHERE post_id = ANY($1)
            ORDER BY comment_date ASC, comment_id ASC
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;

        let mut comments: HashMap<Uuid, Vec<CommentEntity>> = HashMap::new();
        for row in comment_rows {
            let comment = CommentEntity::from(row);
            comments.entry(comment.post_id).or_default().push(comment);
        }

        Ok(rows
            .into_iter()
            .map(|row| PostEntity {
                comments: comments.remove(&row.post_id).unwrap_or_default(),
                post_id: row.post_id,
                author: row.author,
                date_posted: row.date_posted,
                message: row.message,
                likes: row.likes,
                version: row.version,
            })
            .collect())
    }

    async fn select(&self, filter: &str) -> Result<Vec<PostRow>, DomainError> {
        sqlx::query_as(&format!(
            "{SELECT_POSTS} {filter} ORDER BY p.date_posted ASC, p.post_id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    #[instrument(skip(self, post), fields(post_id = %post.post_id))]
    async fn create(&self, post: &PostEntity) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            INSERT INTO posts (post_id, author, date_posted, message, likes, version)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (SELECT 1 FROM removed_posts WHERE post_id = $1)
            ON CONFLICT (post_id) DO NOTHING
            ",
        )
        .bind(post.post_id)
        .bind(&post.author)
        .bind(post.date_posted)
        .bind(&post.message)
        .bind(post.likes)
        .bind(post.version)
        .execute(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, post_id: Uuid) -> Result<Option<PostEntity>, DomainError> {
        let row: Option<PostRow> = sqlx::query_as(&format!("{SELECT_POSTS} WHERE p.post_id = $1"))
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| infrastructure(&e))?;
        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    #[instrument(skip(self, post), fields(post_id = %post.post_id))]
    async fn update(&self, post: &PostEntity) -> Result<(), DomainError> {
        sqlx::query(
            r"
            UPDATE posts
            SET author = $2, date_posted = $3, message = $4, likes = $5, version = $6
            WHERE post_id = $1
            ",
        )
        .bind(post.post_id)
        .bind(&post.author)
        .bind(post.date_posted)
        .bind(&post.message)
        .bind(post.likes)
        .bind(post.version)
        .execute(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, post_id: Uuid, version: i64) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| infrastructure(&e))?;
        sqlx::query(
            r"
            INSERT INTO removed_posts (post_id, version)
            VALUES ($1, $2)
            ON CONFLICT (post_id) DO NOTHING
            ",
        )
        .bind(post_id)
        .bind(version)
        .execute(&mut *tx)
        .await
        .map_err(|e| infrastructure(&e))?;
        // Comments go with the row through ON DELETE CASCADE.
        sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| infrastructure(&e))?;
        tx.commit().await.map_err(|e| infrastructure(&e))?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PostEntity>, DomainError> {
        let rows = self.select("").await?;
        self.hydrate(rows).await
    }

    #[instrument(skip(self))]
    async fn list_by_author(&self, author: &str) -> Result<Vec<PostEntity>, DomainError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "{SELECT_POSTS} WHERE strpos(p.author, $1) > 0 ORDER BY p.date_posted ASC, p.post_id ASC"
        ))
        .bind(author)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;
        self.hydrate(rows).await
    }

    async fn list_with_comments(&self) -> Result<Vec<PostEntity>, DomainError> {
        let rows = self
            .select("WHERE EXISTS (SELECT 1 FROM comments c WHERE c.post_id = p.post_id)")
            .await?;
        self.hydrate(rows).await
    }

    #[instrument(skip(self))]
    async fn list_with_likes(&self, number_of_likes: i32) -> Result<Vec<PostEntity>, DomainError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "{SELECT_POSTS} WHERE p.likes >= $1 ORDER BY p.date_posted ASC, p.post_id ASC"
        ))
        .bind(number_of_likes)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;
        self.hydrate(rows).await
    }
}

//! In-memory read-model repositories.
//!
//! Posts and comments live in one shared table set so that reads return
//! posts with their comments attached, as the database adapters do. Build
//! both repositories with [`InMemoryPostRepository::comments`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use postwall_core::error::DomainError;
use postwall_post_query::domain::entities::{CommentEntity, PostEntity};
use postwall_post_query::domain::repositories::{CommentRepository, PostRepository};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    posts: BTreeMap<Uuid, PostEntity>,
    comments: BTreeMap<Uuid, CommentEntity>,
    removed: BTreeMap<Uuid, i64>,
    fail_writes: bool,
}

impl Tables {
    fn hydrate(&self, post: &PostEntity) -> PostEntity {
        let mut comments: Vec<CommentEntity> = self
            .comments
            .values()
            .filter(|c| c.post_id == post.post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.comment_date, c.comment_id));
        PostEntity {
            comments,
            ..post.clone()
        }
    }

    fn select(&self, filter: impl Fn(&PostEntity) -> bool) -> Vec<PostEntity> {
        let mut posts: Vec<PostEntity> = self
            .posts
            .values()
            .map(|p| self.hydrate(p))
            .filter(|p| filter(p))
            .collect();
        posts.sort_by_key(|p| (p.date_posted, p.post_id));
        posts
    }

    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes {
            return Err(DomainError::Infrastructure("read store unavailable".into()));
        }
        Ok(())
    }
}

/// In-memory [`PostRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPostRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryPostRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a comment repository sharing this repository's tables.
    #[must_use]
    pub fn comments(&self) -> InMemoryCommentRepository {
        InMemoryCommentRepository {
            tables: Arc::clone(&self.tables),
        }
    }

    /// Makes every subsequent write fail (or succeed again) with an
    /// infrastructure error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_fail_writes(&self, fail: bool) {
        self.tables.lock().unwrap().fail_writes = fail;
    }

    /// Drops every post and comment row, as if the read database had been
    /// emptied. Tombstones of removed posts survive.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear(&self) {
        let mut tables = self.tables.lock().unwrap();
        tables.posts.clear();
        tables.comments.clear();
    }

    /// Returns every post with its comments, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn snapshot(&self) -> Vec<PostEntity> {
        self.tables.lock().unwrap().select(|_| true)
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: &PostEntity) -> Result<bool, DomainError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        if tables.posts.contains_key(&post.post_id) || tables.removed.contains_key(&post.post_id)
        {
            return Ok(false);
        }
        tables.posts.insert(
            post.post_id,
            PostEntity {
                comments: Vec::new(),
                ..post.clone()
            },
        );
        Ok(true)
    }

    async fn get_by_id(&self, post_id: Uuid) -> Result<Option<PostEntity>, DomainError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.posts.get(&post_id).map(|p| tables.hydrate(p)))
    }

    async fn update(&self, post: &PostEntity) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        if let Some(row) = tables.posts.get_mut(&post.post_id) {
            *row = PostEntity {
                comments: Vec::new(),
                ..post.clone()
            };
        }
        Ok(())
    }

    async fn remove(&self, post_id: Uuid, version: i64) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        tables.removed.entry(post_id).or_insert(version);
        tables.posts.remove(&post_id);
        tables.comments.retain(|_, c| c.post_id != post_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PostEntity>, DomainError> {
        Ok(self.tables.lock().unwrap().select(|_| true))
    }

    async fn list_by_author(&self, author: &str) -> Result<Vec<PostEntity>, DomainError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .select(|p| p.author.contains(author)))
    }

    async fn list_with_comments(&self) -> Result<Vec<PostEntity>, DomainError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .select(|p| !p.comments.is_empty()))
    }

    async fn list_with_likes(&self, number_of_likes: i32) -> Result<Vec<PostEntity>, DomainError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .select(|p| p.likes >= number_of_likes))
    }
}

/// In-memory [`CommentRepository`]; obtain one from
/// [`InMemoryPostRepository::comments`].
#[derive(Debug, Clone)]
pub struct InMemoryCommentRepository {
    tables: Arc<Mutex<Tables>>,
}

#[async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn create(&self, comment: &CommentEntity) -> Result<bool, DomainError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        if tables.comments.contains_key(&comment.comment_id) {
            return Ok(false);
        }
        tables.comments.insert(comment.comment_id, comment.clone());
        Ok(true)
    }

    async fn get_by_id(&self, comment_id: Uuid) -> Result<Option<CommentEntity>, DomainError> {
        Ok(self.tables.lock().unwrap().comments.get(&comment_id).cloned())
    }

    async fn update(&self, comment: &CommentEntity) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        if let Some(row) = tables.comments.get_mut(&comment.comment_id) {
            *row = comment.clone();
        }
        Ok(())
    }

    async fn delete(&self, comment_id: Uuid) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        tables.comments.remove(&comment_id);
        Ok(())
    }

    async fn delete_by_post(&self, post_id: Uuid) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_writable()?;
        tables.comments.retain(|_, c| c.post_id != post_id);
        Ok(())
    }
}

//! Query handlers for the post read model.

use std::sync::Arc;

use async_trait::async_trait;
use postwall_core::error::DomainError;
use postwall_core::query::{QueryDispatcherBuilder, QueryHandler};

use crate::domain::entities::PostEntity;
use crate::domain::queries::{
    FindAllPosts, FindPostById, FindPostsByAuthor, FindPostsWithComments, FindPostsWithLikes,
};
use crate::domain::repositories::PostRepository;

/// Answers every post query from a [`PostRepository`].
#[derive(Clone)]
pub struct PostQueryHandler {
    posts: Arc<dyn PostRepository>,
}

impl std::fmt::Debug for PostQueryHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostQueryHandler").finish_non_exhaustive()
    }
}

impl PostQueryHandler {
    /// Creates a handler reading from `posts`.
    #[must_use]
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }
}

#[async_trait]
impl QueryHandler<FindAllPosts, PostEntity> for PostQueryHandler {
    async fn handle(&self, _query: FindAllPosts) -> Result<Vec<PostEntity>, DomainError> {
        self.posts.list_all().await
    }
}

#[async_trait]
impl QueryHandler<FindPostById, PostEntity> for PostQueryHandler {
    async fn handle(&self, query: FindPostById) -> Result<Vec<PostEntity>, DomainError> {
        Ok(self.posts.get_by_id(query.post_id).await?.into_iter().collect())
    }
}

#[async_trait]
impl QueryHandler<FindPostsByAuthor, PostEntity> for PostQueryHandler {
    async fn handle(&self, query: FindPostsByAuthor) -> Result<Vec<PostEntity>, DomainError> {
        self.posts.list_by_author(&query.author).await
    }
}

#[async_trait]
impl QueryHandler<FindPostsWithComments, PostEntity> for PostQueryHandler {
    async fn handle(&self, _query: FindPostsWithComments) -> Result<Vec<PostEntity>, DomainError> {
        self.posts.list_with_comments().await
    }
}

#[async_trait]
impl QueryHandler<FindPostsWithLikes, PostEntity> for PostQueryHandler {
    async fn handle(&self, query: FindPostsWithLikes) -> Result<Vec<PostEntity>, DomainError> {
        if query.number_of_likes < 0 {
            return Err(DomainError::Validation(
                "number of likes must not be negative".to_owned(),
            ));
        }
        self.posts.list_with_likes(query.number_of_likes).await
    }
}

/// Registers `handler` for every post query.
///
/// # Errors
///
/// Returns `DomainError::Routing` if any post query already has a handler.
pub fn register_post_query_handlers(
    builder: &mut QueryDispatcherBuilder<PostEntity>,
    handler: &Arc<PostQueryHandler>,
) -> Result<(), DomainError> {
    builder
        .register::<FindAllPosts, _>(Arc::clone(handler))?
        .register::<FindPostById, _>(Arc::clone(handler))?
        .register::<FindPostsByAuthor, _>(Arc::clone(handler))?
        .register::<FindPostsWithComments, _>(Arc::clone(handler))?
        .register::<FindPostsWithLikes, _>(Arc::clone(handler))?;
    Ok(())
}

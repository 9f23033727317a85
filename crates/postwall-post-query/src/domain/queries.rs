//! Queries over the post read model.

use postwall_core::query::Query;
use uuid::Uuid;

/// Every post.
#[derive(Debug, Clone, Default)]
pub struct FindAllPosts;

/// One post by id; the result has zero or one entry.
#[derive(Debug, Clone)]
pub struct FindPostById {
    /// The post to fetch.
    pub post_id: Uuid,
}

/// Posts whose author contains the given text.
#[derive(Debug, Clone)]
pub struct FindPostsByAuthor {
    /// Text to look for in the author name.
    pub author: String,
}

/// Posts that have at least one comment.
#[derive(Debug, Clone, Default)]
pub struct FindPostsWithComments;

/// Posts with at least `number_of_likes` likes.
#[derive(Debug, Clone)]
pub struct FindPostsWithLikes {
    /// Minimum number of likes.
    pub number_of_likes: i32,
}

impl Query for FindAllPosts {
    fn query_type(&self) -> &'static str {
        "FindAllPosts"
    }
}

impl Query for FindPostById {
    fn query_type(&self) -> &'static str {
        "FindPostById"
    }
}

impl Query for FindPostsByAuthor {
    fn query_type(&self) -> &'static str {
        "FindPostsByAuthor"
    }
}

impl Query for FindPostsWithComments {
    fn query_type(&self) -> &'static str {
        "FindPostsWithComments"
    }
}

impl Query for FindPostsWithLikes {
    fn query_type(&self) -> &'static str {
        "FindPostsWithLikes"
    }
}

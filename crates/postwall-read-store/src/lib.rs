//! Postwall Read Store: PostgreSQL persistence for the post read model.
//!
//! Tables are created by the workspace `migrations/`; comments reference
//! their post with `ON DELETE CASCADE`.

pub mod pg_comment_repository;
pub mod pg_post_repository;

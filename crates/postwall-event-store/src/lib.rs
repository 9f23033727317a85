//! Postwall Event Store: PostgreSQL persistence for aggregate event streams.
//!
//! The schema lives in the workspace `migrations/` directory.

pub mod pg_event_repository;

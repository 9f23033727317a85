//! Projection, consumption and query handling.

pub mod consumer;
pub mod projector;
pub mod query_handlers;

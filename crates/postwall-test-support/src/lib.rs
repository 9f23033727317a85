//! Shared test mocks and utilities for Postwall.

mod clock;
mod producer;
mod read_model;
mod repository;

pub use clock::FixedClock;
pub use producer::{FailingEventProducer, RecordingEventProducer};
pub use read_model::{InMemoryCommentRepository, InMemoryPostRepository};
pub use repository::{
    ConflictingEventRepository, EmptyEventRepository, FailingEventRepository,
    InMemoryEventRepository, RecordingEventRepository,
};

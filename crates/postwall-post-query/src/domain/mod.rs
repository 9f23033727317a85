//! Read model types, repository ports and queries.

pub mod entities;
pub mod queries;
pub mod repositories;

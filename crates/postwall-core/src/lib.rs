//! Postwall Core: shared event-sourcing and CQRS abstractions.
//!
//! This crate defines the aggregate, event, command and query contracts,
//! the ports for durable event storage and message brokering, and the
//! event-sourcing handler that ties them together. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod handler;
pub mod messaging;
pub mod query;
pub mod repository;

mod registry;

//! Postwall: post events shared by the command and query sides.
//!
//! The write side raises these events and the read side projects them, so
//! both depend on one definition of the wire shape.

pub mod events;

/// Aggregate type tag stored alongside every post event.
pub const POST_AGGREGATE_TYPE: &str = "post";

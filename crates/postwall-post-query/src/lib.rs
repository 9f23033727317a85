//! Postwall: post query side.
//!
//! Keeps a denormalized read model of posts and comments up to date from the
//! event stream and answers queries against it.

pub mod application;
pub mod domain;

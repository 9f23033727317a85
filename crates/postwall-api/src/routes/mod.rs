//! HTTP routes: post commands, read-model lookups, recovery and health.

pub mod health;
pub mod post_lookup;
pub mod posts;
pub mod restore;

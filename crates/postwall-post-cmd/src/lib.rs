//! Postwall: post command side.
//!
//! Responsible for validating post and comment changes against the post's
//! history and recording the resulting events.

pub mod application;
pub mod domain;

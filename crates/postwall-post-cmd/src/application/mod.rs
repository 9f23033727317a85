//! Command handling.

pub mod command_handlers;

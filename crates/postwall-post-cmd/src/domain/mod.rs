//! The post aggregate and the commands it accepts.

pub mod aggregates;
pub mod commands;

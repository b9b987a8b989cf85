//! CLI command implementations

pub mod draft;
pub mod strategies;

//! CLI command implementations

pub mod config;
pub mod edit;
pub mod project;
pub mod serve;
pub mod status;

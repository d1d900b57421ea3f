//! CLI command implementations.

pub mod bootstrap;
pub mod migrate;
pub mod status;

//! Profile Shop Core - Shared types library.
//!
//! This crate provides common types used across all Profile Shop components:
//! - `db` - Persistence layer (backends, bootstrap, repositories)
//! - `cli` - Command-line tools for bootstrap and migration
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, user roles and order status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

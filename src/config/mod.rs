//! Configuration module for the percolate build system
//!
//! Provides types and parsing for `percolate.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;

//! Percolate - asset build for browser client scripts
//!
//! This library provides functionality to:
//! - Compile an indentation-based `.coffee` dialect to JavaScript with source maps
//! - Minify JavaScript without renaming, remapping the source map through it
//! - Concatenate minified files into one bundle with a merged map
//! - Copy vendor files and run these steps as a dependency-ordered task graph

pub mod build;
pub mod bundle;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod minify;
pub mod sourcemap;
pub mod watch;

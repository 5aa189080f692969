//! Build pipeline module for percolate
//!
//! Turns the configured tasks into a dependency-ordered plan and runs it.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Expand glob patterns and create a plan from the config
//! - **Planning**: Order targets by dependency and group them into levels
//! - **Execution**: Copy vendor files and bundle scripts
//!
//! # Example
//!
//! ```ignore
//! use percolate::build::{BuildContext, BuildPipeline};
//! use percolate::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let result = BuildPipeline::new(context).build()?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod error;
pub mod output;
pub mod parallel;
pub mod pipeline;
pub mod progress;
pub mod result;
pub mod scripts;
pub mod target;
pub mod vendor;

pub use context::*;
pub use discovery::*;
pub use error::*;
pub use parallel::*;
pub use pipeline::*;
pub use result::*;
pub use scripts::*;
pub use target::*;
pub use vendor::*;

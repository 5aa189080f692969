//! Build error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::compiler::CompileError;
use crate::minify::MinifyError;

/// Error during build execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// A vendor file listed for copying does not exist
    #[error("missing dependency: {}", .path.display())]
    MissingDependency { path: PathBuf },
    /// A glob pattern matched no files
    #[error("no files match pattern '{pattern}'")]
    NoMatchingFiles { pattern: String },
    /// A glob pattern could not be parsed
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    /// A source file failed to compile
    #[error("{}:{line}:{column}: {message}", .path.display())]
    Compile { path: PathBuf, line: u32, column: u32, message: String },
    /// Compiled output could not be minified
    #[error("{}: minify failed: {source}", .path.display())]
    Minify {
        path: PathBuf,
        #[source]
        source: MinifyError,
    },
    /// Filesystem read or write failure
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Task dependencies form a cycle
    #[error("circular dependency detected involving task '{0}'")]
    CyclicDependency(String),
    /// A task name that the plan does not contain
    #[error("unknown task '{0}'")]
    UnknownTask(String),
}

impl BuildError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        BuildError::Io { path: path.to_path_buf(), source }
    }

    pub fn compile(path: &Path, error: CompileError) -> Self {
        BuildError::Compile {
            path: path.to_path_buf(),
            line: error.line,
            column: error.column,
            message: error.message,
        }
    }
}

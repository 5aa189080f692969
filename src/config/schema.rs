//! Configuration schema types for `percolate.toml`
//!
//! Defines the task declarations and the validation rules for a project.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Validation severity level for config issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Treat as error, fail build
    Error,
    /// Emit warning, continue build
    Warn,
    /// Silently ignore
    Ignore,
}

impl Default for ValidationLevel {
    fn default() -> Self {
        Self::Error
    }
}

/// How the finished source map is attached to a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// `<bundle>.map` next to the bundle
    #[default]
    External,
    /// Base64 `data:` URL appended to the bundle
    Inline,
    /// No source map
    None,
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,
    /// Public output directory; every task writes below it
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name(), out: default_out() }
    }
}

fn default_name() -> String {
    "app".to_string()
}

fn default_out() -> PathBuf {
    PathBuf::from("public")
}

/// A vendor copy task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Task name
    pub name: String,
    /// Files to copy, in order
    pub sources: Vec<PathBuf>,
    /// Destination directory, relative to `project.out`
    #[serde(default = "default_dest")]
    pub dest: PathBuf,
    /// Tasks that must finish first
    #[serde(default)]
    pub depends: Vec<String>,
}

fn default_dest() -> PathBuf {
    PathBuf::from("js")
}

/// A compile-minify-concatenate task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Task name
    pub name: String,
    /// Ordered glob patterns; `!pattern` excludes
    pub sources: Vec<String>,
    /// Destination directory, relative to `project.out`
    #[serde(default = "default_dest")]
    pub dest: PathBuf,
    /// Bundle file name
    #[serde(default = "default_bundle_file")]
    pub file: String,
    /// Compile without the top-level function wrapper
    #[serde(default)]
    pub bare: bool,
    /// What to do when a pattern matches nothing
    #[serde(default)]
    pub on_empty: ValidationLevel,
    /// Source map output
    #[serde(default)]
    pub source_map: SourceMapMode,
    /// `sourceRoot` recorded in the map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    /// Embed sources as `sourcesContent`
    #[serde(default = "default_true")]
    pub include_content: bool,
    /// Keep `/*! ... */` comments when minifying
    #[serde(default)]
    pub preserve_license_comments: bool,
    /// Tasks that must finish first
    #[serde(default)]
    pub depends: Vec<String>,
}

fn default_bundle_file() -> String {
    "all.min.js".to_string()
}

fn default_true() -> bool {
    true
}

/// A no-op task that only depends on others
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Task name
    pub name: String,
    /// Tasks run by this group
    #[serde(default)]
    pub depends: Vec<String>,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: true }
    }
}

/// Complete percolate.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PercolateConfig {
    /// Project metadata
    #[serde(default)]
    pub project: ProjectConfig,
    /// Vendor copy tasks
    #[serde(default)]
    pub copy: Vec<CopyConfig>,
    /// Bundle tasks
    #[serde(default)]
    pub bundle: Vec<BundleConfig>,
    /// Group tasks
    #[serde(default)]
    pub group: Vec<GroupConfig>,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "bundle.scripts.file")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "percolate.toml: '{}' {}", self.field, self.message)
    }
}

static BUNDLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*\.js$").expect("valid regex"));

/// Whether `path` stays inside the directory it is joined to.
fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl PercolateConfig {
    /// Names of every declared task, in declaration order (copy, bundle, group).
    pub fn task_names(&self) -> Vec<&str> {
        self.copy
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.bundle.iter().map(|b| b.name.as_str()))
            .chain(self.group.iter().map(|g| g.name.as_str()))
            .collect()
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut error = |field: String, message: &str| {
            errors.push(ConfigValidationError { field, message: message.to_string() });
        };

        if self.project.out.as_os_str().is_empty() {
            error("project.out".to_string(), "must be a non-empty path");
        }

        let mut seen = HashSet::new();
        for name in self.task_names() {
            if name.is_empty() {
                error("name".to_string(), "task names must be non-empty");
            } else if !seen.insert(name) {
                error(format!("{}.name", name), "is declared more than once");
            }
        }

        let known: HashSet<&str> = self.task_names().into_iter().collect();
        let mut check_depends = |kind: &str, name: &str, depends: &[String]| {
            for dep in depends {
                if !known.contains(dep.as_str()) {
                    error(format!("{}.{}.depends", kind, name), &format!("references unknown task '{}'", dep));
                }
            }
        };
        for copy in &self.copy {
            check_depends("copy", &copy.name, &copy.depends);
        }
        for bundle in &self.bundle {
            check_depends("bundle", &bundle.name, &bundle.depends);
        }
        for group in &self.group {
            check_depends("group", &group.name, &group.depends);
        }

        for copy in &self.copy {
            if copy.sources.is_empty() {
                error(format!("copy.{}.sources", copy.name), "must list at least one file");
            }
            if !is_contained(&copy.dest) {
                error(format!("copy.{}.dest", copy.name), "must be a relative path inside project.out");
            }
        }

        for bundle in &self.bundle {
            if bundle.sources.iter().all(|s| s.starts_with('!')) {
                error(format!("bundle.{}.sources", bundle.name), "must contain at least one glob pattern");
            }
            if !BUNDLE_NAME_RE.is_match(&bundle.file) {
                error(format!("bundle.{}.file", bundle.name), "must be a plain file name ending in .js");
            }
            if !is_contained(&bundle.dest) {
                error(format!("bundle.{}.dest", bundle.name), "must be a relative path inside project.out");
            }
        }

        if self.watch.debounce_ms == 0 {
            error("watch.debounce_ms".to_string(), "must be a positive integer");
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

//! Finding and reading `percolate.toml`.

use super::schema::{
    BundleConfig, CopyConfig, GroupConfig, PercolateConfig, ProjectConfig, SourceMapMode,
    ValidationLevel, WatchConfig,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "percolate.toml";

/// Directory the built-in vendor scripts are installed under.
const VENDOR_ROOT: &str = "bower_components";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse percolate.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Every problem found, one message each
    #[error("Config validation failed:{}", .0.iter().map(|m| format!("\n  - {}", m)).collect::<String>())]
    Validation(Vec<String>),
}

/// Command-line values that win over the file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub out: Option<PathBuf>,
}

/// Nearest percolate.toml at or above the working directory.
pub fn find_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_from(&cwd)
}

/// Nearest percolate.toml at or above `start`.
pub fn find_config_from(start: &Path) -> Option<PathBuf> {
    start.ancestors().map(|dir| dir.join(CONFIG_FILE)).find(|candidate| candidate.is_file())
}

/// Read and validate `path`, or the discovered file when `path` is `None`.
/// With nothing to read the built-in [`default_config`] is used.
pub fn load_config(path: Option<&Path>) -> Result<PercolateConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match find_config() {
            Some(found) => found,
            None => return Ok(default_config()),
        },
    };

    let config = parse_config(&std::fs::read_to_string(&path)?)?;
    tracing::debug!(path = %path.display(), tasks = config.task_names().len(), "loaded config");
    Ok(config)
}

fn parse_config(text: &str) -> Result<PercolateConfig, ConfigError> {
    let config: PercolateConfig = toml::from_str(text)?;
    match config.validate() {
        errors if errors.is_empty() => Ok(config),
        errors => Err(ConfigError::Validation(errors.iter().map(ToString::to_string).collect())),
    }
}

fn vendor_script(package: &str, file: &str) -> PathBuf {
    [VENDOR_ROOT, package, file].iter().collect()
}

/// Pipeline used when the project has no percolate.toml.
///
/// `vendor` copies angular, angular-route and jquery into `public/js`,
/// `scripts` bundles `client/**/*.coffee` then `app.coffee` into
/// `public/js/all.min.js`, and `default` runs both.
pub fn default_config() -> PercolateConfig {
    let name = std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "app".to_string());

    let vendor = CopyConfig {
        name: "vendor".to_string(),
        sources: vec![
            vendor_script("angular", "angular.min.js"),
            vendor_script("angular-route", "angular-route.min.js"),
            vendor_script("jquery", "dist/jquery.min.js"),
        ],
        dest: PathBuf::from("js"),
        depends: vec![],
    };
    let scripts = BundleConfig {
        name: "scripts".to_string(),
        sources: vec!["client/**/*.coffee".to_string(), "app.coffee".to_string()],
        dest: PathBuf::from("js"),
        file: "all.min.js".to_string(),
        bare: false,
        on_empty: ValidationLevel::Error,
        source_map: SourceMapMode::External,
        source_root: None,
        include_content: true,
        preserve_license_comments: false,
        depends: vec![],
    };
    let default = GroupConfig {
        name: "default".to_string(),
        depends: vec![vendor.name.clone(), scripts.name.clone()],
    };

    PercolateConfig {
        project: ProjectConfig { name, out: PathBuf::from("public") },
        copy: vec![vendor],
        bundle: vec![scripts],
        group: vec![default],
        watch: WatchConfig::default(),
    }
}

pub fn merge_cli_overrides(config: &mut PercolateConfig, overrides: &CliOverrides) {
    if let Some(out) = &overrides.out {
        config.project.out = out.clone();
    }
}

/// Directory holding the config file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// `path` joined onto `project_root` unless already absolute.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    project_root.join(path)
}

//! Source file discovery for the build system.
//!
//! Expands ordered glob patterns into a File Set and turns the configured
//! tasks into a [`BuildPlan`].

use crate::build::{BuildContext, BuildError, BuildPlan, BuildTarget, TargetKind};
use crate::config::ValidationLevel;
use glob::{glob, Pattern};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Result of expanding a list of patterns.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Expansion {
    /// Matched files, in File Set order
    pub files: Vec<PathBuf>,
    /// Patterns that matched nothing under `on_empty = "warn"`
    pub warnings: Vec<String>,
}

/// Discover files matching a single glob pattern, sorted lexicographically.
///
/// The pattern is resolved against `base_dir`. Directories are skipped and
/// an unreadable directory on the way is an [`BuildError::Io`].
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, BuildError> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        format!("{}/{}", Pattern::escape(&base_dir.to_string_lossy()), pattern)
    };

    let paths = glob(&full_pattern).map_err(|e| BuildError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| BuildError::Io { path: e.path().to_path_buf(), source: e.into_error() })?;
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Expand ordered patterns into a File Set.
///
/// Each pattern contributes its matches in sorted order; a file matched by an
/// earlier pattern is not added again. Patterns starting with `!` remove
/// matching files (relative to `base_dir`) from the whole set.
pub fn expand_patterns(
    base_dir: &Path,
    patterns: &[String],
    on_empty: ValidationLevel,
) -> Result<Expansion, BuildError> {
    let mut exclusions = Vec::new();
    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            let compiled = Pattern::new(negated).map_err(|e| BuildError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            exclusions.push(compiled);
        }
    }

    let mut expansion = Expansion::default();
    let mut seen = HashSet::new();

    for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
        let matched = discover_files(base_dir, pattern)?;

        if matched.is_empty() {
            match on_empty {
                ValidationLevel::Error => {
                    return Err(BuildError::NoMatchingFiles { pattern: pattern.clone() });
                }
                ValidationLevel::Warn => {
                    tracing::warn!(pattern = %pattern, "pattern matched no files");
                    expansion.warnings.push(pattern.clone());
                }
                ValidationLevel::Ignore => {}
            }
            continue;
        }

        for file in matched {
            if is_excluded(base_dir, &file, &exclusions) {
                continue;
            }
            if seen.insert(file.clone()) {
                expansion.files.push(file);
            }
        }
    }

    tracing::debug!(files = expansion.files.len(), "expanded file set");
    Ok(expansion)
}

fn is_excluded(base_dir: &Path, file: &Path, exclusions: &[Pattern]) -> bool {
    if exclusions.is_empty() {
        return false;
    }
    let relative = file.strip_prefix(base_dir).unwrap_or(file);
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    exclusions.iter().any(|p| p.matches(&relative))
}

/// Create a build plan from the configuration.
///
/// Produces one target per `[[copy]]`, `[[bundle]]` and `[[group]]` entry,
/// with `depends` names resolved to target ids. The plan is narrowed to the
/// context's target filter when one is set.
pub fn create_build_plan(ctx: &BuildContext) -> Result<BuildPlan, BuildError> {
    let config = ctx.config();
    let out_dir = ctx.out_dir();

    let mut ids: HashMap<&str, String> = HashMap::new();
    for copy in &config.copy {
        ids.insert(&copy.name, format!("{}:{}", TargetKind::Copy, copy.name));
    }
    for bundle in &config.bundle {
        ids.insert(&bundle.name, format!("{}:{}", TargetKind::Bundle, bundle.name));
    }
    for group in &config.group {
        ids.insert(&group.name, format!("{}:{}", TargetKind::Group, group.name));
    }

    let resolve_deps = |depends: &[String]| -> Result<Vec<String>, BuildError> {
        depends
            .iter()
            .map(|name| ids.get(name.as_str()).cloned().ok_or_else(|| BuildError::UnknownTask(name.clone())))
            .collect()
    };

    let mut plan = BuildPlan::new();

    for copy in &config.copy {
        let sources = copy.sources.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        let target = BuildTarget::copy(copy.name.clone(), sources, out_dir.join(&copy.dest))
            .with_dependencies(resolve_deps(&copy.depends)?);
        plan.add_target(target);
    }

    for bundle in &config.bundle {
        let output = out_dir.join(&bundle.dest).join(&bundle.file);
        let target = BuildTarget::bundle(bundle.name.clone(), bundle.sources.clone(), output)
            .with_dependencies(resolve_deps(&bundle.depends)?);
        plan.add_target(target);
    }

    for group in &config.group {
        let target =
            BuildTarget::group(group.name.clone()).with_dependencies(resolve_deps(&group.depends)?);
        plan.add_target(target);
    }

    match ctx.target_filter() {
        Some(filter) => plan.select(filter),
        None => Ok(plan),
    }
}

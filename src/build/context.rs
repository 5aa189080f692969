//! Everything a task needs to know about the project it builds.

use crate::config::PercolateConfig;
use std::path::{Component, Path, PathBuf};

/// Loaded config plus the directory it was found in.
///
/// Task paths in the config are relative to `project_root`; `out_dir`
/// resolves `[project] out` against it. A task filter narrows the plan
/// to the named tasks and whatever they depend on.
#[derive(Debug, Clone)]
pub struct BuildContext {
    config: PercolateConfig,
    project_root: PathBuf,
    verbose: bool,
    target_filter: Option<Vec<String>>,
}

impl BuildContext {
    pub fn new(config: PercolateConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, verbose: false, target_filter: None }
    }

    pub fn with_verbose(self, verbose: bool) -> Self {
        Self { verbose, ..self }
    }

    /// An empty list clears the filter.
    pub fn with_filter(self, tasks: Vec<String>) -> Self {
        let target_filter = Some(tasks).filter(|t| !t.is_empty());
        Self { target_filter, ..self }
    }

    pub fn config(&self) -> &PercolateConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn target_filter(&self) -> Option<&[String]> {
        self.target_filter.as_deref()
    }

    /// The public output directory.
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::resolve_path(&self.project_root, path)
    }

    /// `path` as shown to users: project-relative with `/` separators, or
    /// unchanged when it lies outside the project.
    pub fn display_path(&self, path: &Path) -> String {
        let Ok(relative) = path.strip_prefix(&self.project_root) else {
            return path.to_string_lossy().into_owned();
        };
        let parts: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect();
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    fn ctx() -> BuildContext {
        BuildContext::new(default_config(), PathBuf::from("/site"))
    }

    #[test]
    fn test_defaults() {
        let ctx = ctx();
        assert_eq!(ctx.project_root(), Path::new("/site"));
        assert_eq!(ctx.out_dir(), PathBuf::from("/site/public"));
        assert!(!ctx.is_verbose());
        assert!(ctx.target_filter().is_none());
    }

    #[test]
    fn test_builders() {
        let ctx = ctx().with_verbose(true).with_filter(vec!["scripts".to_string()]);
        assert!(ctx.is_verbose());
        assert_eq!(ctx.target_filter(), Some(&["scripts".to_string()][..]));
        assert!(ctx.with_filter(vec![]).target_filter().is_none());
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(ctx().resolve_path(Path::new("client")), PathBuf::from("/site/client"));
        assert_eq!(ctx().resolve_path(Path::new("/var/js")), PathBuf::from("/var/js"));
    }

    #[test]
    fn test_display_path() {
        let ctx = ctx();
        assert_eq!(ctx.display_path(Path::new("/site/client/app.coffee")), "client/app.coffee");
        assert_eq!(ctx.display_path(Path::new("/elsewhere/x.coffee")), "/elsewhere/x.coffee");
    }
}

//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for `percolate build --watch`.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::build::{BuildContext, BuildError, BuildResult};
use crate::config::schema::WatchConfig;
use crate::config::CONFIG_FILE;

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("failed to watch {}: {source}", .path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Channel receive error
    #[error("watch channel error: {0}")]
    Channel(String),
}

/// Tracks failing targets across rebuilds to report recoveries
#[derive(Debug, Default)]
pub struct FailureTracker {
    failing: HashSet<String>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new build result and return the targets that failed last
    /// time but succeed now, sorted.
    pub fn update(&mut self, result: &BuildResult) -> Vec<String> {
        let current: HashSet<String> =
            result.failures().iter().map(|r| r.target_id.clone()).collect();

        let mut recovered: Vec<String> = self
            .failing
            .iter()
            .filter(|id| !current.contains(*id) && result.get(id).is_some())
            .cloned()
            .collect();
        recovered.sort();

        self.failing = current;
        recovered
    }

    pub fn has_failures(&self) -> bool {
        !self.failing.is_empty()
    }
}

/// Decides which changed paths should trigger a rebuild.
///
/// A path is relevant when it matches one of the bundle patterns, is one
/// of the vendor files, or is the config file. Anything under the output
/// directory is ignored so the build does not retrigger itself.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    out_dir: PathBuf,
    patterns: Vec<glob::Pattern>,
    files: HashSet<PathBuf>,
}

impl ChangeFilter {
    /// Build a filter from the tasks in `ctx`.
    pub fn from_context(ctx: &BuildContext) -> Self {
        let config = ctx.config();
        let patterns = config
            .bundle
            .iter()
            .flat_map(|b| b.sources.iter())
            .filter(|p| !p.starts_with('!'))
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();
        let mut files: HashSet<PathBuf> = config
            .copy
            .iter()
            .flat_map(|c| c.sources.iter())
            .map(|p| ctx.resolve_path(p))
            .collect();
        files.insert(ctx.project_root().join(CONFIG_FILE));

        Self { root: ctx.project_root().to_path_buf(), out_dir: ctx.out_dir(), patterns, files }
    }

    /// Directory to watch recursively.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if path.starts_with(&self.out_dir) {
            return false;
        }
        if self.files.contains(path) {
            return true;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.patterns.iter().any(|p| p.matches(&relative))
    }
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Watch for file changes and rebuild automatically.
///
/// Runs `build` once up front and again after every debounced batch of
/// relevant changes. Build failures are printed and watching continues.
/// Blocks until the watcher channel closes.
pub fn watch_and_rebuild<F>(
    filter: ChangeFilter,
    config: &WatchConfig,
    mut build: F,
) -> Result<(), WatchError>
where
    F: FnMut(&[PathBuf]) -> Result<BuildResult, BuildError>,
{
    let (tx, rx) = channel();

    let debounce = Duration::from_millis(u64::from(config.debounce_ms));
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
    debouncer
        .watcher()
        .watch(filter.root(), RecursiveMode::Recursive)
        .map_err(|source| WatchError::WatchPath { path: filter.root().to_path_buf(), source })?;

    let mut tracker = FailureTracker::new();

    if config.clear_screen {
        clear_screen();
    }
    run_once(&mut build, &[], &mut tracker);
    println!("[{}] Watching {} for changes...", timestamp(), filter.root().display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let mut changed: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .filter(|p| filter.is_relevant(p))
                    .collect();
                changed.sort();
                changed.dedup();

                if changed.is_empty() {
                    continue;
                }
                tracing::debug!(changed = changed.len(), "rebuild triggered");

                if config.clear_screen {
                    clear_screen();
                }
                run_once(&mut build, &changed, &mut tracker);
                println!("[{}] Watching {} for changes...", timestamp(), filter.root().display());
            }
            Ok(Err(error)) => {
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
            }
            Err(e) => {
                return Err(WatchError::Channel(e.to_string()));
            }
        }
    }
}

fn run_once<F>(build: &mut F, changed: &[PathBuf], tracker: &mut FailureTracker)
where
    F: FnMut(&[PathBuf]) -> Result<BuildResult, BuildError>,
{
    match build(changed) {
        Ok(result) => {
            for id in tracker.update(&result) {
                println!("[{}] Fixed: {}", timestamp(), id);
            }
            println!("[{}] {}", timestamp(), result.summary());
        }
        Err(e) => {
            eprintln!("[{}] Build error: {}", timestamp(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::TargetResult;
    use crate::config::default_config;

    fn result(entries: &[(&str, bool)]) -> BuildResult {
        let mut result = BuildResult::new();
        for (id, ok) in entries {
            let target = if *ok {
                TargetResult::success(id.to_string(), vec![], Duration::ZERO)
            } else {
                TargetResult::failed(id.to_string(), "boom".to_string(), Duration::ZERO)
            };
            result.add_result(target);
        }
        result
    }

    #[test]
    fn test_failure_tracker_detects_recovery() {
        let mut tracker = FailureTracker::new();
        assert!(tracker.update(&result(&[("bundle:scripts", false), ("copy:vendor", true)])).is_empty());
        assert!(tracker.has_failures());

        let recovered = tracker.update(&result(&[("bundle:scripts", true), ("copy:vendor", true)]));
        assert_eq!(recovered, vec!["bundle:scripts"]);
        assert!(!tracker.has_failures());
    }

    #[test]
    fn test_failure_tracker_ignores_targets_not_rebuilt() {
        let mut tracker = FailureTracker::new();
        tracker.update(&result(&[("bundle:scripts", false)]));
        assert!(tracker.update(&result(&[("copy:vendor", true)])).is_empty());
    }

    #[test]
    fn test_change_filter() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));
        let filter = ChangeFilter::from_context(&ctx);

        assert!(filter.is_relevant(Path::new("/project/client/controllers/main.coffee")));
        assert!(filter.is_relevant(Path::new("/project/app.coffee")));
        assert!(filter.is_relevant(Path::new("/project/percolate.toml")));
        assert!(filter.is_relevant(Path::new("/project/bower_components/jquery/dist/jquery.min.js")));
        assert!(!filter.is_relevant(Path::new("/project/public/js/all.min.js")));
        assert!(!filter.is_relevant(Path::new("/project/README.md")));
        assert!(!filter.is_relevant(Path::new("/elsewhere/app.coffee")));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(&ts[2..3], ":");
    }
}

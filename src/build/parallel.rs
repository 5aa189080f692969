//! Parallel build execution.
//!
//! Groups independent targets into levels that can be built concurrently.
//!
//! # How It Works
//!
//! 1. Group targets into levels where all dependencies are in earlier levels
//! 2. Execute each level on a pool of scoped worker threads
//! 3. Wait for all targets in a level to complete before starting the next
//!
//! # Example
//!
//! ```ignore
//! use percolate::build::{BuildContext, ParallelBuild};
//!
//! let context = BuildContext::new(config, project_root);
//! let result = ParallelBuild::new(context).with_jobs(4).run()?;
//! println!("{}", result.summary());
//! ```

use crate::build::pipeline::{blocked_by, execute_target, report_completed, report_finished};
use crate::build::progress::{NullProgress, ProgressEvent, ProgressReporter};
use crate::build::{BuildContext, BuildError, BuildPlan, BuildResult, BuildTarget, TargetResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Default number of parallel jobs (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Parallel build executor.
pub struct ParallelBuild {
    context: BuildContext,
    jobs: usize,
    reporter: Arc<dyn ProgressReporter>,
}

impl ParallelBuild {
    pub fn new(context: BuildContext) -> Self {
        Self { context, jobs: default_jobs(), reporter: Arc::new(NullProgress::new()) }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Report progress events to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Create the plan from the context and run it.
    pub fn run(&self) -> Result<BuildResult, BuildError> {
        let plan = crate::build::create_build_plan(&self.context)?;
        self.run_plan(&plan)
    }

    /// Run the build with a pre-created plan.
    pub fn run_plan(&self, plan: &BuildPlan) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let levels = compute_levels(plan)?;

        tracing::debug!(targets = plan.len(), levels = levels.len(), jobs = self.jobs, "parallel build");
        self.reporter.report(ProgressEvent::BuildStarted { total_targets: plan.len() });

        let mut result = BuildResult::new();
        for level in levels {
            let mut runnable = Vec::with_capacity(level.len());
            for target in level {
                match blocked_by(target, &result) {
                    Some(dep) => {
                        let blocked = TargetResult::blocked(target.id.clone(), dep);
                        report_completed(&self.context, self.reporter.as_ref(), &blocked);
                        result.add_result(blocked);
                    }
                    None => runnable.push(target),
                }
            }

            for target_result in self.execute_level(&runnable) {
                result.add_result(target_result);
            }
        }

        let result = result.with_duration(start.elapsed());
        report_finished(self.reporter.as_ref(), &result);
        Ok(result)
    }

    /// Execute a single level of targets in parallel.
    fn execute_level(&self, targets: &[&BuildTarget]) -> Vec<TargetResult> {
        let reporter = self.reporter.as_ref();

        if self.jobs == 1 || targets.len() <= 1 {
            return targets.iter().map(|t| execute_target(&self.context, t, reporter)).collect();
        }

        let results = Arc::new(Mutex::new(Vec::with_capacity(targets.len())));
        let next_idx = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..self.jobs.min(targets.len()) {
                let results = Arc::clone(&results);
                let next_idx = &next_idx;

                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= targets.len() {
                        break;
                    }

                    let result = execute_target(&self.context, targets[idx], reporter);
                    if let Ok(mut results) = results.lock() {
                        results.push((idx, result));
                    }
                });
            }
        });

        // Sort by original index to keep plan order
        let mut results = match Arc::try_unwrap(results) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(arc) => arc.lock().map(|r| r.clone()).unwrap_or_default(),
        };
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }
}

/// Compute dependency levels for a build plan.
///
/// Each inner vector holds targets whose dependencies all sit in earlier
/// levels, in plan order. Dependencies outside the plan are ignored.
pub fn compute_levels(plan: &BuildPlan) -> Result<Vec<Vec<&BuildTarget>>, BuildError> {
    let targets = plan.targets();
    let known: HashSet<&str> = targets.iter().map(|t| t.id.as_str()).collect();

    let mut level_of: HashMap<&str, usize> = HashMap::new();
    let mut levels: Vec<Vec<&BuildTarget>> = Vec::new();

    while level_of.len() < targets.len() {
        let current = levels.len();
        let this_level: Vec<&BuildTarget> = targets
            .iter()
            .filter(|t| !level_of.contains_key(t.id.as_str()))
            .filter(|t| {
                t.dependencies
                    .iter()
                    .filter(|d| known.contains(d.as_str()))
                    .all(|d| level_of.get(d.as_str()).is_some_and(|&l| l < current))
            })
            .collect();

        if this_level.is_empty() {
            let stuck = targets
                .iter()
                .find(|t| !level_of.contains_key(t.id.as_str()))
                .map(|t| t.id.clone())
                .unwrap_or_default();
            return Err(BuildError::CyclicDependency(stuck));
        }

        for target in &this_level {
            level_of.insert(target.id.as_str(), current);
        }
        levels.push(this_level);
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn ids(level: &[&BuildTarget]) -> Vec<String> {
        level.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_compute_levels_default_graph() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));
        let plan = crate::build::create_build_plan(&ctx).unwrap();

        let levels = compute_levels(&plan).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(ids(&levels[0]), vec!["copy:vendor", "bundle:scripts"]);
        assert_eq!(ids(&levels[1]), vec!["group:default"]);
    }

    #[test]
    fn test_compute_levels_chain() {
        let mut plan = BuildPlan::new();
        plan.add_target(BuildTarget::group("c".to_string()).with_dependency("group:b".to_string()));
        plan.add_target(BuildTarget::group("b".to_string()).with_dependency("group:a".to_string()));
        plan.add_target(BuildTarget::group("a".to_string()));

        let levels = compute_levels(&plan).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(ids(&levels[0]), vec!["group:a"]);
        assert_eq!(ids(&levels[2]), vec!["group:c"]);
    }

    #[test]
    fn test_compute_levels_cycle() {
        let mut plan = BuildPlan::new();
        plan.add_target(BuildTarget::group("a".to_string()).with_dependency("group:b".to_string()));
        plan.add_target(BuildTarget::group("b".to_string()).with_dependency("group:a".to_string()));

        assert!(matches!(compute_levels(&plan), Err(BuildError::CyclicDependency(_))));
    }

    #[test]
    fn test_compute_levels_empty() {
        assert!(compute_levels(&BuildPlan::new()).unwrap().is_empty());
    }

    #[test]
    fn test_with_jobs_minimum() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));
        assert_eq!(ParallelBuild::new(ctx).with_jobs(0).jobs(), 1);
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_parallel_build_matches_sequential_output() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bower_components/angular/angular.min.js", "/*a*/");
        write(temp.path(), "bower_components/angular-route/angular-route.min.js", "/*r*/");
        write(temp.path(), "bower_components/jquery/dist/jquery.min.js", "/*j*/");
        write(temp.path(), "client/a.coffee", "a = [1..3]\n");
        write(temp.path(), "app.coffee", "b = a.length\n");

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let result = ParallelBuild::new(ctx.clone()).with_jobs(4).run().unwrap();
        assert!(result.is_success(), "{}", result.summary());
        let ids: Vec<_> = result.targets.iter().map(|r| r.target_id.as_str()).collect();
        assert_eq!(ids, vec!["copy:vendor", "bundle:scripts", "group:default"]);

        let bundle = temp.path().join("public/js/all.min.js");
        let parallel = fs::read(&bundle).unwrap();
        crate::build::BuildPipeline::new(ctx).build().unwrap();
        assert_eq!(parallel, fs::read(&bundle).unwrap());
    }
}

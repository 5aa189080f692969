//! Build pipeline orchestration.
//!
//! The pipeline runs build targets one at a time in dependency order.
//! [`execute_target`] is shared with the parallel executor.

use crate::build::progress::{NullProgress, ProgressEvent, ProgressReporter, TargetStatus};
use crate::build::{
    build_bundle, copy_files, BuildContext, BuildError, BuildPlan, BuildResult, BuildTarget,
    TargetKind, TargetResult,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Sequential build pipeline.
pub struct BuildPipeline {
    context: BuildContext,
    reporter: Arc<dyn ProgressReporter>,
}

impl BuildPipeline {
    /// Create a new build pipeline that reports nothing.
    pub fn new(context: BuildContext) -> Self {
        Self { context, reporter: Arc::new(NullProgress::new()) }
    }

    /// Report progress events to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Create the plan from the context and run it.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let plan = crate::build::create_build_plan(&self.context)?;
        self.build_plan(&plan)
    }

    /// Run the build with a pre-created plan.
    pub fn build_plan(&self, plan: &BuildPlan) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let ordered = plan.build_order()?;

        tracing::debug!(targets = ordered.len(), "sequential build");
        self.reporter.report(ProgressEvent::BuildStarted { total_targets: ordered.len() });

        let mut result = BuildResult::new();
        for target in ordered {
            let target_result = match blocked_by(target, &result) {
                Some(dep) => {
                    let blocked = TargetResult::blocked(target.id.clone(), dep);
                    report_completed(&self.context, self.reporter.as_ref(), &blocked);
                    blocked
                }
                None => execute_target(&self.context, target, self.reporter.as_ref()),
            };
            result.add_result(target_result);
        }

        let result = result.with_duration(start.elapsed());
        report_finished(self.reporter.as_ref(), &result);
        Ok(result)
    }
}

/// First dependency of `target` that has already failed in `result`.
pub(crate) fn blocked_by<'a>(target: &'a BuildTarget, result: &BuildResult) -> Option<&'a str> {
    target
        .dependencies
        .iter()
        .find(|dep| result.get(dep).is_some_and(|r| !r.is_success()))
        .map(String::as_str)
}

/// Run one target and report its outcome.
pub fn execute_target(
    ctx: &BuildContext,
    target: &BuildTarget,
    reporter: &dyn ProgressReporter,
) -> TargetResult {
    let start = Instant::now();
    reporter.report(ProgressEvent::TargetStarted { target_id: target.id.clone() });

    let result = match run_target(ctx, target) {
        Ok((outputs, warnings)) => {
            for warning in &warnings {
                reporter.report(ProgressEvent::Warning {
                    target_id: Some(target.id.clone()),
                    message: warning.clone(),
                });
            }
            TargetResult::success(target.id.clone(), outputs, start.elapsed()).with_warnings(warnings)
        }
        Err(e) => {
            tracing::debug!(target = %target.id, error = %e, "target failed");
            TargetResult::failed(target.id.clone(), e.to_string(), start.elapsed())
        }
    };

    report_completed(ctx, reporter, &result);
    result
}

fn run_target(ctx: &BuildContext, target: &BuildTarget) -> Result<(Vec<PathBuf>, Vec<String>), BuildError> {
    match target.kind {
        TargetKind::Copy => {
            let outputs = copy_files(ctx.project_root(), &target.sources, &target.output)?;
            Ok((outputs, vec![]))
        }
        TargetKind::Bundle => {
            let config = ctx
                .config()
                .bundle
                .iter()
                .find(|b| b.name == target.name)
                .ok_or_else(|| BuildError::UnknownTask(target.name.clone()))?;
            let outcome = build_bundle(ctx, config, &target.output)?;
            tracing::debug!(target = %target.id, files = outcome.files, "bundled");
            Ok((outcome.outputs, outcome.warnings))
        }
        TargetKind::Group => Ok((vec![], vec![])),
    }
}

pub(crate) fn report_completed(ctx: &BuildContext, reporter: &dyn ProgressReporter, result: &TargetResult) {
    let status = TargetStatus::from(&result.status);
    reporter.report(ProgressEvent::TargetCompleted {
        target_id: result.target_id.clone(),
        status,
        error: result.status.error(),
        duration_ms: result.duration.as_millis() as u64,
        outputs: result.outputs.iter().map(|p| ctx.display_path(p)).collect(),
    });
}

pub(crate) fn report_finished(reporter: &dyn ProgressReporter, result: &BuildResult) {
    reporter.report(ProgressEvent::BuildCompleted {
        success: result.is_success(),
        duration_ms: result.total_duration.as_millis() as u64,
        succeeded: result.success_count(),
        failed: result.failed_count(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn vendor(root: &Path) {
        write(root, "bower_components/angular/angular.min.js", "/*a*/");
        write(root, "bower_components/angular-route/angular-route.min.js", "/*r*/");
        write(root, "bower_components/jquery/dist/jquery.min.js", "/*j*/");
    }

    #[test]
    fn test_pipeline_default_build() {
        let temp = TempDir::new().unwrap();
        vendor(temp.path());
        write(temp.path(), "client/app/main.coffee", "square = (x) -> x * x\n");
        write(temp.path(), "app.coffee", "console.log square 3\n");

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let result = BuildPipeline::new(ctx).build().unwrap();

        assert!(result.is_success(), "{}", result.summary());
        assert_eq!(result.targets.len(), 3);
        let js = temp.path().join("public/js");
        assert!(js.join("all.min.js").exists());
        assert!(js.join("all.min.js.map").exists());
        assert!(js.join("jquery.min.js").exists());
    }

    #[test]
    fn test_pipeline_failure_blocks_dependents() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "client/a.coffee", "a = 1\n");
        write(temp.path(), "app.coffee", "b = 2\n");

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let result = BuildPipeline::new(ctx).build().unwrap();

        assert!(!result.is_success());
        assert!(result.get("bundle:scripts").unwrap().is_success());
        let vendor = result.get("copy:vendor").unwrap();
        assert!(vendor.status.to_string().contains("missing dependency"));
        let group = result.get("group:default").unwrap();
        assert_eq!(
            group.status,
            crate::build::BuildStatus::Blocked { dependency: "copy:vendor".to_string() }
        );
    }

    #[test]
    fn test_pipeline_with_filter() {
        let temp = TempDir::new().unwrap();
        vendor(temp.path());

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf())
            .with_filter(vec!["vendor".to_string()]);
        let result = BuildPipeline::new(ctx).build().unwrap();

        assert!(result.is_success());
        assert_eq!(result.targets.len(), 1);
        assert!(!temp.path().join("public/js/all.min.js").exists());
    }

    #[test]
    fn test_execute_group_target() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));
        let target = BuildTarget::group("default".to_string());
        let result = execute_target(&ctx, &target, &NullProgress::new());
        assert!(result.is_success());
        assert!(result.outputs.is_empty());
    }
}

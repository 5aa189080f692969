//! Outcome of a build run, per target and overall.

use crate::build::progress::format_duration;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Warnings listed in a summary before the rest are counted.
const SUMMARY_WARNINGS: usize = 5;

/// How a target finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    /// The target ran and returned an error
    Failed(String),
    /// A dependency failed, so the target never ran
    Blocked { dependency: String },
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success)
    }

    /// Blocked targets count as failures.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The message reported for a failure.
    pub fn error(&self) -> Option<String> {
        match self {
            BuildStatus::Success => None,
            BuildStatus::Failed(message) => Some(message.clone()),
            BuildStatus::Blocked { dependency } => Some(format!("dependency '{}' failed", dependency)),
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            None => f.write_str("success"),
            Some(message) => write!(f, "failed: {}", message),
        }
    }
}

/// What one target produced.
#[derive(Debug, Clone)]
pub struct TargetResult {
    /// `kind:name` of the target
    pub target_id: String,
    pub status: BuildStatus,
    /// Files written, in write order
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
    /// Non-fatal problems, such as patterns that matched nothing
    pub warnings: Vec<String>,
}

impl TargetResult {
    fn finished(target_id: String, status: BuildStatus, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { target_id, status, outputs, duration, warnings: Vec::new() }
    }

    pub fn success(target_id: String, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self::finished(target_id, BuildStatus::Success, outputs, duration)
    }

    pub fn failed(target_id: String, error: String, duration: Duration) -> Self {
        Self::finished(target_id, BuildStatus::Failed(error), Vec::new(), duration)
    }

    /// Result for a target skipped because `dependency` failed.
    pub fn blocked(target_id: String, dependency: &str) -> Self {
        let status = BuildStatus::Blocked { dependency: dependency.to_string() };
        Self::finished(target_id, status, Vec::new(), Duration::ZERO)
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Results of every target in a run, in the order they finished.
#[derive(Debug, Default)]
pub struct BuildResult {
    pub targets: Vec<TargetResult>,
    pub total_duration: Duration,
}

impl BuildResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: TargetResult) {
        self.targets.push(result);
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn get(&self, target_id: &str) -> Option<&TargetResult> {
        self.targets.iter().find(|r| r.target_id == target_id)
    }

    pub fn success_count(&self) -> usize {
        self.targets.len() - self.failed_count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().len()
    }

    /// True when no target failed or was blocked.
    pub fn is_success(&self) -> bool {
        self.targets.iter().all(TargetResult::is_success)
    }

    /// Every file written by the run.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.targets.iter().flat_map(|r| &r.outputs).collect()
    }

    /// Every warning as `(target id, message)`.
    pub fn warnings(&self) -> Vec<(&str, &str)> {
        self.targets
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| (r.target_id.as_str(), w.as_str())))
            .collect()
    }

    pub fn failures(&self) -> Vec<&TargetResult> {
        self.targets.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Human-readable report: one headline, failed targets, then warnings.
    pub fn summary(&self) -> String {
        let took = format_duration(self.total_duration.as_millis() as u64);
        let failures = self.failures();

        let mut lines = if failures.is_empty() {
            vec![format!(
                "Build succeeded: {}, {} written in {}",
                plural(self.targets.len(), "task", "tasks"),
                plural(self.all_outputs().len(), "file", "files"),
                took
            )]
        } else {
            let mut lines = vec![format!(
                "Build failed: {} succeeded, {} failed ({} total) in {}",
                self.success_count(),
                failures.len(),
                self.targets.len(),
                took
            )];
            lines.extend(failures.iter().map(|r| format!("  - {}: {}", r.target_id, r.status)));
            lines
        };

        let warnings = self.warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}):", warnings.len()));
            for (target, message) in warnings.iter().take(SUMMARY_WARNINGS) {
                lines.push(format!("  - {}: {}", target, message));
            }
            if warnings.len() > SUMMARY_WARNINGS {
                lines.push(format!("  ... and {} more", warnings.len() - SUMMARY_WARNINGS));
            }
        }

        lines.join("\n")
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_failure() -> TargetResult {
        TargetResult::failed(
            "bundle:scripts".to_string(),
            "app.coffee:2:1: reserved word 'var'".to_string(),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BuildStatus::Success.to_string(), "success");
        assert_eq!(BuildStatus::Failed("boom".to_string()).to_string(), "failed: boom");
        let blocked = BuildStatus::Blocked { dependency: "copy:vendor".to_string() };
        assert_eq!(blocked.to_string(), "failed: dependency 'copy:vendor' failed");
    }

    #[test]
    fn test_blocked_counts_as_failure() {
        let result = TargetResult::blocked("group:default".to_string(), "bundle:scripts");
        assert!(!result.is_success());
        assert_eq!(result.status.error().as_deref(), Some("dependency 'bundle:scripts' failed"));
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn test_counts_and_outputs() {
        let mut result = BuildResult::new();
        result.add_result(TargetResult::success(
            "copy:vendor".to_string(),
            vec![PathBuf::from("public/js/angular.min.js")],
            Duration::ZERO,
        ));
        result.add_result(bundle_failure());

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.is_success());
        assert_eq!(result.all_outputs(), vec![&PathBuf::from("public/js/angular.min.js")]);
        assert!(result.get("bundle:scripts").is_some());
        assert!(result.get("group:default").is_none());
    }

    #[test]
    fn test_warnings_keep_their_target() {
        let mut result = BuildResult::new();
        result.add_result(
            TargetResult::success("bundle:scripts".to_string(), vec![], Duration::ZERO)
                .with_warnings(vec!["no files match pattern 'lib/*.coffee'".to_string()]),
        );
        assert_eq!(result.warnings(), vec![("bundle:scripts", "no files match pattern 'lib/*.coffee'")]);
    }

    #[test]
    fn test_summary_success() {
        let mut result = BuildResult::new();
        result.add_result(TargetResult::success(
            "bundle:scripts".to_string(),
            vec![PathBuf::from("all.min.js"), PathBuf::from("all.min.js.map")],
            Duration::ZERO,
        ));
        let result = result.with_duration(Duration::from_millis(250));

        assert_eq!(result.summary(), "Build succeeded: 1 task, 2 files written in 250ms");
    }

    #[test]
    fn test_summary_failure_lists_targets() {
        let mut result = BuildResult::new();
        result.add_result(bundle_failure());
        result.add_result(TargetResult::blocked("group:default".to_string(), "bundle:scripts"));

        let summary = result.summary();
        assert!(summary.starts_with("Build failed: 0 succeeded, 2 failed (2 total)"), "{}", summary);
        assert!(summary.contains("  - bundle:scripts: failed: app.coffee:2:1"));
        assert!(summary.contains("  - group:default: failed: dependency 'bundle:scripts' failed"));
    }

    #[test]
    fn test_summary_truncates_warnings() {
        let warnings = (0..7).map(|i| format!("no files match pattern 'p{}'", i)).collect();
        let mut result = BuildResult::new();
        result.add_result(TargetResult::success("bundle:scripts".to_string(), vec![], Duration::ZERO).with_warnings(warnings));

        let summary = result.summary();
        assert!(summary.contains("Warnings (7):"));
        assert!(summary.contains("  ... and 2 more"));
    }
}

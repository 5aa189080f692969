//! Build progress reporting.
//!
//! User-facing build events go through a [`ProgressReporter`]: colored
//! console lines, JSON lines for tooling, or nothing at all. Both writing
//! reporters default to stderr so stdout stays free for command output.
//!
//! ```ignore
//! use percolate::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new().with_verbose(true);
//! reporter.report(ProgressEvent::BuildStarted { total_targets: 3 });
//! ```

use crate::build::BuildStatus;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Outcome of a target as reported in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Success,
    Failed,
    /// Not run because a dependency failed
    Blocked,
}

impl From<&BuildStatus> for TargetStatus {
    fn from(status: &BuildStatus) -> Self {
        match status {
            BuildStatus::Success => TargetStatus::Success,
            BuildStatus::Failed(_) => TargetStatus::Failed,
            BuildStatus::Blocked { .. } => TargetStatus::Blocked,
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetStatus::Success => "ok",
            TargetStatus::Failed => "FAILED",
            TargetStatus::Blocked => "BLOCKED",
        })
    }
}

/// Something that happened during a build or watch session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    BuildStarted {
        total_targets: usize,
    },
    TargetStarted {
        target_id: String,
    },
    TargetCompleted {
        target_id: String,
        status: TargetStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        duration_ms: u64,
        /// Files written, relative to the project root
        #[serde(skip_serializing_if = "Vec::is_empty")]
        outputs: Vec<String>,
    },
    BuildCompleted {
        success: bool,
        duration_ms: u64,
        succeeded: usize,
        failed: usize,
    },
    /// Watch mode saw changes and is rebuilding
    Rebuilding {
        /// Changed paths, relative to the project root
        changed: Vec<String>,
    },
    Warning {
        #[serde(skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        message: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        message: String,
    },
}

/// Receives build events. Shared between worker threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Line-oriented writer shared by the reporters. Write errors are dropped;
/// a closed stderr must not fail the build.
struct Sink(Mutex<Box<dyn Write + Send>>);

impl Sink {
    fn stderr() -> Self {
        Self::to(std::io::stderr())
    }

    fn to<W: Write + Send + 'static>(writer: W) -> Self {
        Sink(Mutex::new(Box::new(writer)))
    }

    fn line(&self, text: &str) {
        if let Ok(mut out) = self.0.lock() {
            let _ = writeln!(out, "{}", text);
        }
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Good,
    Warn,
    Bad,
    Label,
}

impl Tone {
    fn ansi(self) -> &'static str {
        match self {
            Tone::Good => "\x1b[32m",
            Tone::Warn => "\x1b[33m",
            Tone::Bad => "\x1b[31m",
            Tone::Label => "\x1b[36m",
        }
    }
}

/// Human-readable reporter: one line per finished target, numbered
/// against the total announced by `BuildStarted`.
pub struct ConsoleProgress {
    sink: Sink,
    colors: bool,
    verbose: bool,
    done: AtomicUsize,
    total: AtomicUsize,
}

impl fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("colors", &self.colors)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl ConsoleProgress {
    /// Colored output to stderr.
    pub fn new() -> Self {
        Self::from_sink(Sink::stderr(), true)
    }

    /// Plain output to `output`.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self::from_sink(Sink::to(output), false)
    }

    fn from_sink(sink: Sink, colors: bool) -> Self {
        Self { sink, colors, verbose: false, done: AtomicUsize::new(0), total: AtomicUsize::new(0) }
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Also report target starts and the files each target wrote.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn paint(&self, tone: Tone, text: &str) -> String {
        if self.colors {
            format!("{}{}\x1b[0m", tone.ansi(), text)
        } else {
            text.to_string()
        }
    }

    fn tagged(&self, tag: &str, tone: Tone, target_id: Option<&str>, message: &str) {
        let tag = self.paint(tone, tag);
        match target_id {
            Some(id) => self.sink.line(&format!("{} {}: {}", tag, id, message)),
            None => self.sink.line(&format!("{} {}", tag, message)),
        }
    }

    fn target_completed(
        &self,
        target_id: &str,
        status: TargetStatus,
        error: Option<&str>,
        duration_ms: u64,
        outputs: &[String],
    ) {
        let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst).max(n);
        let tone = if status == TargetStatus::Success { Tone::Good } else { Tone::Bad };

        self.sink.line(&format!(
            "{} [{}/{}] {} {} ({})",
            self.paint(Tone::Label, "[build]"),
            n,
            total,
            self.paint(tone, &status.to_string()),
            target_id,
            format_duration(duration_ms)
        ));
        if let Some(error) = error {
            self.sink.line(&format!("        {}", self.paint(Tone::Bad, error)));
        }
        if self.verbose {
            for output in outputs {
                self.sink.line(&format!("        -> {}", output));
            }
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_targets } => {
                self.total.store(total_targets, Ordering::SeqCst);
                self.done.store(0, Ordering::SeqCst);
                if total_targets > 0 {
                    let noun = if total_targets == 1 { "task" } else { "tasks" };
                    self.tagged("[build]", Tone::Label, None, &format!("Running {} {}...", total_targets, noun));
                }
            }
            ProgressEvent::TargetStarted { target_id } if self.verbose => {
                self.tagged("[build]", Tone::Label, None, &format!("Starting {}", target_id));
            }
            ProgressEvent::TargetStarted { .. } => {}
            ProgressEvent::TargetCompleted { target_id, status, error, duration_ms, outputs } => {
                self.target_completed(&target_id, status, error.as_deref(), duration_ms, &outputs);
            }
            ProgressEvent::BuildCompleted { success: true, duration_ms, succeeded, .. } => {
                let noun = if succeeded == 1 { "task" } else { "tasks" };
                let message = format!("{} {} finished in {}", succeeded, noun, format_duration(duration_ms));
                self.tagged("[done]", Tone::Good, None, &message);
            }
            ProgressEvent::BuildCompleted { success: false, duration_ms, succeeded, failed } => {
                let noun = if failed == 1 { "failure" } else { "failures" };
                let message = format!(
                    "Build failed: {} succeeded, {} {} in {}",
                    succeeded,
                    failed,
                    noun,
                    format_duration(duration_ms)
                );
                self.tagged("[error]", Tone::Bad, None, &message);
            }
            ProgressEvent::Rebuilding { changed } => {
                let first = changed.first().map(String::as_str).unwrap_or("");
                let message = match changed.len() {
                    0 | 1 => format!("{} changed, rebuilding", first),
                    n => format!("{} (+{} more) changed, rebuilding", first, n - 1),
                };
                self.tagged("[watch]", Tone::Label, None, &message);
            }
            ProgressEvent::Warning { target_id, message } => {
                self.tagged("[warn]", Tone::Warn, target_id.as_deref(), &message);
            }
            ProgressEvent::Error { target_id, message } => {
                self.tagged("[error]", Tone::Bad, target_id.as_deref(), &message);
            }
        }
    }
}

/// One JSON object per event, for editors and CI.
pub struct JsonProgress {
    sink: Sink,
}

impl fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonProgress").finish_non_exhaustive()
    }
}

impl JsonProgress {
    pub fn new() -> Self {
        Self { sink: Sink::stderr() }
    }

    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { sink: Sink::to(output) }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => self.sink.line(&json),
            Err(e) => tracing::error!(error = %e, "failed to serialize progress event"),
        }
    }
}

/// `250ms`, `1.5s` or `2m 5s`.
pub fn format_duration(ms: u64) -> String {
    match ms {
        0..=999 => format!("{}ms", ms),
        1_000..=59_999 => format!("{:.1}s", ms as f64 / 1000.0),
        _ => format!("{}m {}s", ms / 60_000, ms % 60_000 / 1000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn console() -> (Captured, ConsoleProgress) {
        let out = Captured::default();
        let reporter = ConsoleProgress::with_output(out.clone());
        (out, reporter)
    }

    fn completed(status: TargetStatus, error: Option<&str>) -> ProgressEvent {
        ProgressEvent::TargetCompleted {
            target_id: "bundle:scripts".to_string(),
            status,
            error: error.map(str::to_string),
            duration_ms: 150,
            outputs: vec!["public/js/all.min.js".to_string()],
        }
    }

    #[test]
    fn test_status_from_build_status() {
        assert_eq!(TargetStatus::from(&BuildStatus::Success), TargetStatus::Success);
        assert_eq!(TargetStatus::from(&BuildStatus::Failed("x".to_string())), TargetStatus::Failed);
        let blocked = BuildStatus::Blocked { dependency: "copy:vendor".to_string() };
        assert_eq!(TargetStatus::from(&blocked), TargetStatus::Blocked);
    }

    #[test]
    fn test_console_build_started() {
        let (out, reporter) = console();
        reporter.report(ProgressEvent::BuildStarted { total_targets: 3 });
        assert_eq!(out.text(), "[build] Running 3 tasks...\n");
    }

    #[test]
    fn test_console_target_numbering() {
        let (out, reporter) = console();
        let reporter = reporter.with_verbose(true);
        reporter.report(ProgressEvent::BuildStarted { total_targets: 2 });
        reporter.report(completed(TargetStatus::Success, None));
        reporter.report(completed(TargetStatus::Success, None));

        let text = out.text();
        assert!(text.contains("[1/2] ok bundle:scripts (150ms)"), "{}", text);
        assert!(text.contains("[2/2] ok bundle:scripts"), "{}", text);
        assert!(text.contains("        -> public/js/all.min.js"));
    }

    #[test]
    fn test_console_failure_shows_error_without_outputs() {
        let (out, reporter) = console();
        reporter.report(completed(TargetStatus::Failed, Some("app.coffee:2:1: reserved word")));

        let text = out.text();
        assert!(text.contains("FAILED bundle:scripts"));
        assert!(text.contains("        app.coffee:2:1: reserved word"));
        assert!(!text.contains("->"));
    }

    #[test]
    fn test_console_blocked_target() {
        let (out, reporter) = console();
        reporter.report(ProgressEvent::TargetCompleted {
            target_id: "group:default".to_string(),
            status: TargetStatus::Blocked,
            error: Some("dependency 'copy:vendor' failed".to_string()),
            duration_ms: 0,
            outputs: vec![],
        });
        assert!(out.text().contains("BLOCKED group:default (0ms)"));
    }

    #[test]
    fn test_console_colors() {
        let (out, reporter) = console();
        reporter.with_colors(true).report(completed(TargetStatus::Success, None));
        assert!(out.text().contains("\x1b[32mok\x1b[0m"));
    }

    #[test]
    fn test_console_build_completed() {
        let (out, reporter) = console();
        reporter.report(ProgressEvent::BuildCompleted { success: false, duration_ms: 1500, succeeded: 1, failed: 2 });
        assert_eq!(out.text(), "[error] Build failed: 1 succeeded, 2 failures in 1.5s\n");
    }

    #[test]
    fn test_console_rebuilding() {
        let (out, reporter) = console();
        reporter.report(ProgressEvent::Rebuilding {
            changed: vec!["client/a.coffee".to_string(), "app.coffee".to_string()],
        });
        assert_eq!(out.text(), "[watch] client/a.coffee (+1 more) changed, rebuilding\n");
    }

    #[test]
    fn test_console_warning() {
        let (out, reporter) = console();
        reporter.report(ProgressEvent::Warning {
            target_id: Some("bundle:scripts".to_string()),
            message: "no files match pattern 'client/**/*.coffee'".to_string(),
        });
        assert!(out.text().starts_with("[warn] bundle:scripts: no files match"));
    }

    #[test]
    fn test_console_hides_starts_unless_verbose() {
        let (out, reporter) = console();
        reporter.report(ProgressEvent::TargetStarted { target_id: "copy:vendor".to_string() });
        assert!(out.text().is_empty());
    }

    #[test]
    fn test_json_build_started() {
        let out = Captured::default();
        JsonProgress::with_output(out.clone()).report(ProgressEvent::BuildStarted { total_targets: 10 });
        assert_eq!(out.text(), "{\"event\":\"build_started\",\"total_targets\":10}\n");
    }

    #[test]
    fn test_json_target_failed() {
        let out = Captured::default();
        JsonProgress::with_output(out.clone()).report(completed(TargetStatus::Failed, Some("say \"hi\"")));

        let value: serde_json::Value = serde_json::from_str(out.text().trim()).unwrap();
        assert_eq!(value["event"], "target_completed");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "say \"hi\"");
        assert_eq!(value["duration_ms"], 150);
    }

    #[test]
    fn test_json_omits_empty_fields() {
        let out = Captured::default();
        JsonProgress::with_output(out.clone())
            .report(ProgressEvent::Warning { target_id: None, message: "m".to_string() });
        assert_eq!(out.text(), "{\"event\":\"warning\",\"message\":\"m\"}\n");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(90_000), "1m 30s");
    }
}

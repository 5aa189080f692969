//! Build command implementation

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::{default_tasks, load_project, BuildArgs, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::progress::{ConsoleProgress, JsonProgress, ProgressEvent, ProgressReporter};
use crate::build::{
    compute_levels, create_build_plan, BuildContext, BuildError, BuildPipeline, BuildResult,
    ParallelBuild,
};
use crate::config::CONFIG_FILE;
use crate::watch::{watch_and_rebuild, ChangeFilter};

/// Run the build command
pub fn run_build(args: BuildArgs, verbose: u8) -> ExitCode {
    let (config, project_root, config_path) =
        match load_project(args.config.as_deref(), args.out.as_deref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };

    let tasks = if args.tasks.is_empty() { default_tasks(&config) } else { args.tasks.clone() };
    let context =
        BuildContext::new(config, project_root).with_verbose(verbose > 0).with_filter(tasks);

    let reporter: Arc<dyn ProgressReporter> = if args.json {
        Arc::new(JsonProgress::new())
    } else {
        Arc::new(
            ConsoleProgress::new()
                .with_colors(std::io::stderr().is_terminal())
                .with_verbose(verbose > 0),
        )
    };

    if args.dry_run {
        return dry_run(&context);
    }

    if args.watch {
        let watch_config = context.config().watch.clone();
        let filter = ChangeFilter::from_context(&context);
        let mut context = context;

        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        let result = watch_and_rebuild(filter, &watch_config, |changed| {
            if !changed.is_empty() {
                reporter.report(ProgressEvent::Rebuilding {
                    changed: changed.iter().map(|p| context.display_path(p)).collect(),
                });
            }
            if let Some(path) = &config_path {
                if changed.iter().any(|p| p.ends_with(CONFIG_FILE)) {
                    context = reload(&context, path, &args);
                }
            }
            execute(&context, args.jobs, Arc::clone(&reporter))
        });

        return match result {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    match execute(&context, args.jobs, Arc::clone(&reporter)) {
        Ok(result) => {
            if result.is_success() {
                if !args.json {
                    println!("{}", result.summary());
                }
                ExitCode::from(EXIT_SUCCESS)
            } else {
                if !args.json {
                    eprintln!("{}", result.summary());
                }
                ExitCode::from(EXIT_ERROR)
            }
        }
        Err(e) => {
            reporter.report(ProgressEvent::Error { target_id: None, message: e.to_string() });
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the selected tasks, one at a time when `jobs` is 1.
fn execute(
    context: &BuildContext,
    jobs: Option<usize>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<BuildResult, BuildError> {
    if jobs == Some(1) {
        return BuildPipeline::new(context.clone()).with_reporter(reporter).build();
    }

    let mut build = ParallelBuild::new(context.clone()).with_reporter(reporter);
    if let Some(jobs) = jobs {
        build = build.with_jobs(jobs);
    }
    build.run()
}

/// Reload the config after it changed on disk. Keeps the previous context
/// when the new file does not load.
fn reload(previous: &BuildContext, path: &Path, args: &BuildArgs) -> BuildContext {
    match load_project(Some(path), args.out.as_deref()) {
        Ok((config, root, _)) => {
            let tasks =
                if args.tasks.is_empty() { default_tasks(&config) } else { args.tasks.clone() };
            BuildContext::new(config, root).with_verbose(previous.is_verbose()).with_filter(tasks)
        }
        Err(e) => {
            eprintln!("Error reloading config, keeping previous tasks: {}", e);
            previous.clone()
        }
    }
}

fn dry_run(context: &BuildContext) -> ExitCode {
    let plan = match create_build_plan(context) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error planning build: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let levels = match compute_levels(&plan) {
        Ok(levels) => levels,
        Err(e) => {
            eprintln!("Error planning build: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    println!("Dry run - would run:");
    println!("  Output: {}", context.out_dir().display());
    println!("  Tasks: {}", plan.len());
    for (i, level) in levels.iter().enumerate() {
        for target in level {
            if target.output.as_os_str().is_empty() {
                println!("    [{}] {}", i, target.id);
            } else {
                println!("    [{}] {} -> {}", i, target.id, context.display_path(&target.output));
            }
        }
    }
    ExitCode::from(EXIT_SUCCESS)
}

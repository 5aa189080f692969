//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod compile;
mod tasks;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{
    default_config, find_config, load_config, merge_cli_overrides, CliOverrides, ConfigError,
    PercolateConfig,
};

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// Percolate - compile, minify and bundle client scripts
#[derive(Parser)]
#[command(name = "percolate")]
#[command(about = "Percolate - compile, minify and bundle .coffee sources and vendor scripts")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log records as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Command to run; without one the `default` task is built
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run build tasks
    Build(BuildArgs),

    /// Compile one source file and print the JavaScript
    Compile {
        /// Source file (.coffee)
        file: PathBuf,

        /// Compile without the top-level function wrapper
        #[arg(short, long)]
        bare: bool,

        /// Append an inline source map
        #[arg(short, long)]
        map: bool,
    },

    /// List tasks and their execution levels
    Tasks {
        /// Path to percolate.toml (default: search upward from cwd)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Arguments of `percolate build`.
#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    /// Tasks to run (names, ids like `bundle:scripts`, or kinds); dependencies
    /// are included. Defaults to the `default` task, or every task.
    pub tasks: Vec<String>,

    /// Path to percolate.toml (default: search upward from cwd)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the public output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Number of tasks to run at once (1 runs them one at a time)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Watch for changes and rebuild automatically
    #[arg(short, long)]
    pub watch: bool,

    /// Show the tasks that would run without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Report progress as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Install the global tracing subscriber. Logs go to stderr.
pub(crate) fn init_tracing(verbose: u8, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbose {
        0 => "percolate=error",
        1 => "percolate=debug",
        _ => "percolate=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        fmt().json().with_env_filter(env_filter).with_writer(std::io::stderr).init();
    } else {
        fmt().with_env_filter(env_filter).with_target(false).with_writer(std::io::stderr).init();
    }
}

/// Load the project configuration and its root directory.
///
/// An explicit `config` path must exist. Otherwise percolate.toml is searched
/// for upward from the working directory, falling back to the built-in
/// pipeline rooted at the working directory.
pub(crate) fn load_project(
    config: Option<&Path>,
    out: Option<&Path>,
) -> Result<(PercolateConfig, PathBuf, Option<PathBuf>), ConfigError> {
    let config_path = match config {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    let (mut config, root) = match &config_path {
        Some(path) => {
            let cfg = load_config(Some(path))?;
            let root = match crate::config::project_root(path) {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => std::env::current_dir()?,
            };
            tracing::debug!(config = %path.display(), "using config");
            (cfg, root)
        }
        None => {
            tracing::debug!("no percolate.toml found, using built-in tasks");
            (default_config(), std::env::current_dir()?)
        }
    };

    merge_cli_overrides(&mut config, &CliOverrides { out: out.map(Path::to_path_buf) });
    Ok((config, root, config_path))
}

/// Tasks to run when none are named: `default` if present, else everything.
pub(crate) fn default_tasks(config: &PercolateConfig) -> Vec<String> {
    if config.task_names().contains(&"default") {
        vec!["default".to_string()]
    } else {
        vec![]
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        None => build::run_build(BuildArgs::default(), cli.verbose),
        Some(Commands::Build(args)) => build::run_build(args, cli.verbose),
        Some(Commands::Compile { file, bare, map }) => compile::run_compile(&file, bare, map),
        Some(Commands::Tasks { config }) => tasks::run_tasks(config.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_no_subcommand() {
        let cli = Cli::try_parse_from(["percolate"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_build_args() {
        let cli = Cli::try_parse_from([
            "percolate", "build", "scripts", "vendor", "--jobs", "2", "--out", "dist", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::Build(args)) => {
                assert_eq!(args.tasks, vec!["scripts", "vendor"]);
                assert_eq!(args.jobs, Some(2));
                assert_eq!(args.out, Some(PathBuf::from("dist")));
                assert!(!args.watch);
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn test_cli_compile_args() {
        let cli = Cli::try_parse_from(["percolate", "compile", "app.coffee", "--bare"]).unwrap();
        match cli.command {
            Some(Commands::Compile { file, bare, map }) => {
                assert_eq!(file, PathBuf::from("app.coffee"));
                assert!(bare);
                assert!(!map);
            }
            _ => panic!("expected compile command"),
        }
    }

    #[test]
    fn test_default_tasks() {
        let config = default_config();
        assert_eq!(default_tasks(&config), vec!["default"]);

        let mut config = default_config();
        config.group.clear();
        assert!(default_tasks(&config).is_empty());
    }
}

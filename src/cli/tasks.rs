//! Tasks command implementation

use std::path::Path;
use std::process::ExitCode;

use super::{default_tasks, load_project, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{compute_levels, create_build_plan, BuildContext, TargetKind};

/// Run the tasks command
pub fn run_tasks(config: Option<&Path>) -> ExitCode {
    let (config, project_root, config_path) = match load_project(config, None) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let defaults = default_tasks(&config);
    let context = BuildContext::new(config, project_root);
    let plan = match create_build_plan(&context) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let levels = match compute_levels(&plan) {
        Ok(levels) => levels,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match config_path {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: built-in defaults"),
    }
    println!("Tasks ({}):", plan.len());
    for target in plan.targets() {
        let marker = if defaults.contains(&target.name) { " (default)" } else { "" };
        let detail = match target.kind {
            TargetKind::Copy => format!(
                "{} file{} -> {}",
                target.sources.len(),
                if target.sources.len() == 1 { "" } else { "s" },
                context.display_path(&target.output)
            ),
            TargetKind::Bundle => {
                format!("{} -> {}", target.sources.join(", "), context.display_path(&target.output))
            }
            TargetKind::Group => String::new(),
        };
        println!("  {}{}  {}", target.id, marker, detail);
        if !target.dependencies.is_empty() {
            println!("      depends on: {}", target.dependencies.join(", "));
        }
    }

    println!("Levels:");
    for (i, level) in levels.iter().enumerate() {
        let ids: Vec<&str> = level.iter().map(|t| t.id.as_str()).collect();
        println!("  {}: {}", i, ids.join(", "));
    }

    ExitCode::from(EXIT_SUCCESS)
}

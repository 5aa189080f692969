//! Project discovery tests
//!
//! These change the process working directory, so they run serially.

use percolate::build::{create_build_plan, BuildContext};
use percolate::config::{find_config, load_config, ConfigError, CONFIG_FILE};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Run `f` with the working directory set to `dir`.
fn in_dir<F, R>(dir: &std::path::Path, f: F) -> R
where
    F: FnOnce() -> R,
{
    let original_dir = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir).unwrap();

    let result = f();

    std::env::set_current_dir(original_dir).unwrap();
    result
}

fn canonical(path: PathBuf) -> PathBuf {
    fs::canonicalize(path).unwrap()
}

#[test]
#[serial]
fn test_find_config_walks_up_from_subdirectory() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(CONFIG_FILE), "[project]\nname = \"shop\"\n").unwrap();
    let nested = temp.path().join("client/controllers");
    fs::create_dir_all(&nested).unwrap();

    let found = in_dir(&nested, find_config).expect("config should be found");
    assert_eq!(canonical(found), canonical(temp.path().join(CONFIG_FILE)));
}

#[test]
#[serial]
fn test_load_config_without_file_uses_builtin_tasks() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("storefront");
    fs::create_dir(&project).unwrap();

    let config = in_dir(&project, || load_config(None)).unwrap();
    assert_eq!(config.project.name, "storefront");
    assert_eq!(config.task_names(), vec!["vendor", "scripts", "default"]);
}

#[test]
#[serial]
fn test_load_config_reports_every_validation_error() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join(CONFIG_FILE),
        r#"[[bundle]]
name = "scripts"
sources = ["!vendor/**"]
file = "../all.js"
depends = ["styles"]
"#,
    )
    .unwrap();

    match in_dir(temp.path(), || load_config(None)) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 3, "{:?}", errors);
            assert!(errors.iter().any(|e| e.contains("bundle.scripts.depends")));
            assert!(errors.iter().any(|e| e.contains("bundle.scripts.sources")));
            assert!(errors.iter().any(|e| e.contains("bundle.scripts.file")));
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_configured_plan_resolves_under_project_root() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join(CONFIG_FILE),
        r#"[project]
out = "dist"

[[copy]]
name = "libs"
sources = ["lib/a.js"]
dest = "vendor"

[[bundle]]
name = "app"
sources = ["src/**/*.coffee"]
file = "app.js"
depends = ["libs"]
"#,
    )
    .unwrap();

    let config = in_dir(temp.path(), || load_config(None)).unwrap();
    let ctx = BuildContext::new(config, temp.path().to_path_buf());
    let plan = create_build_plan(&ctx).unwrap();

    assert_eq!(plan.get("copy:libs").unwrap().output, temp.path().join("dist/vendor"));
    let app = plan.get("bundle:app").unwrap();
    assert_eq!(app.output, temp.path().join("dist/js/app.js"));
    assert_eq!(app.dependencies, vec!["copy:libs"]);
}

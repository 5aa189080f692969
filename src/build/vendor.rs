//! Vendor copier.
//!
//! Copies pre-built third-party files into the public directory unchanged.

use crate::build::BuildError;
use std::fs;
use std::path::{Path, PathBuf};

/// Copy `sources` into `dest`, keeping each file name.
///
/// Relative sources resolve against `base_dir`. Existing files in `dest`
/// are overwritten. The first missing source aborts with
/// [`BuildError::MissingDependency`] carrying the path as configured; files
/// copied before it stay in place.
pub fn copy_files(base_dir: &Path, sources: &[String], dest: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut copied = Vec::with_capacity(sources.len());
    let mut dest_ready = false;

    for source in sources {
        let configured = PathBuf::from(source);
        let path = crate::config::resolve_path(base_dir, &configured);

        let file_name = match path.file_name() {
            Some(name) if path.is_file() => name.to_owned(),
            _ => return Err(BuildError::MissingDependency { path: configured }),
        };

        if !dest_ready {
            fs::create_dir_all(dest).map_err(|e| BuildError::io(dest, e))?;
            dest_ready = true;
        }

        let target = dest.join(file_name);
        fs::copy(&path, &target).map_err(|e| BuildError::io(&path, e))?;
        tracing::debug!(from = %path.display(), to = %target.display(), "copied vendor file");
        copied.push(target);
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vendor_tree(root: &Path) -> Vec<String> {
        let files = [
            ("bower_components/angular/angular.min.js", "/* angular */"),
            ("bower_components/jquery/dist/jquery.min.js", "/* jquery */"),
        ];
        for (rel, body) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        files.iter().map(|(rel, _)| rel.to_string()).collect()
    }

    #[test]
    fn test_copy_files_byte_identical() {
        let temp = TempDir::new().unwrap();
        let sources = vendor_tree(temp.path());
        let dest = temp.path().join("public/js");

        let copied = copy_files(temp.path(), &sources, &dest).unwrap();
        assert_eq!(copied, vec![dest.join("angular.min.js"), dest.join("jquery.min.js")]);
        assert_eq!(fs::read_to_string(dest.join("angular.min.js")).unwrap(), "/* angular */");
        assert_eq!(fs::read_to_string(dest.join("jquery.min.js")).unwrap(), "/* jquery */");
    }

    #[test]
    fn test_copy_files_overwrites() {
        let temp = TempDir::new().unwrap();
        let sources = vendor_tree(temp.path());
        let dest = temp.path().join("public/js");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("angular.min.js"), "stale").unwrap();

        copy_files(temp.path(), &sources, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("angular.min.js")).unwrap(), "/* angular */");
    }

    #[test]
    fn test_copy_files_missing_dependency() {
        let temp = TempDir::new().unwrap();
        let mut sources = vendor_tree(temp.path());
        sources.insert(1, "bower_components/angular-route/angular-route.min.js".to_string());
        let dest = temp.path().join("public/js");

        let err = copy_files(temp.path(), &sources, &dest).unwrap_err();
        match err {
            BuildError::MissingDependency { path } => {
                assert_eq!(path, PathBuf::from("bower_components/angular-route/angular-route.min.js"));
            }
            other => panic!("expected missing dependency, got {:?}", other),
        }
        // no rollback of earlier copies
        assert!(dest.join("angular.min.js").exists());
        assert!(!dest.join("jquery.min.js").exists());
    }

    #[test]
    fn test_copy_files_missing_first_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("public/js");
        let err = copy_files(temp.path(), &["missing.js".to_string()], &dest).unwrap_err();
        assert!(matches!(err, BuildError::MissingDependency { .. }));
        assert!(!dest.exists());
    }
}

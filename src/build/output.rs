//! Staged output writes.
//!
//! Outputs are written to temporary files next to their final location and
//! only renamed into place on [`StagedOutput::commit`]. Dropping an
//! uncommitted stage removes the temporary files, so a failed run leaves
//! existing outputs untouched.
//!
//! ```ignore
//! let mut stage = StagedOutput::new();
//! stage.write(&bundle_path, code.as_bytes())?;
//! stage.write(&map_path, map.as_bytes())?;
//! let written = stage.commit()?;
//! ```

use crate::build::BuildError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A set of files waiting to be moved into place.
#[derive(Debug, Default)]
pub struct StagedOutput {
    pending: Vec<(NamedTempFile, PathBuf)>,
}

impl StagedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `contents` to a temporary file in the directory of `path`.
    ///
    /// The directory is created if needed.
    pub fn write(&mut self, path: &Path, contents: &[u8]) -> Result<(), BuildError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| BuildError::io(&dir, e))?;
        temp.write_all(contents).map_err(|e| BuildError::io(temp.path(), e))?;
        temp.as_file().sync_all().map_err(|e| BuildError::io(temp.path(), e))?;

        self.pending.push((temp, path.to_path_buf()));
        Ok(())
    }

    /// Number of staged files.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Rename every staged file into place.
    ///
    /// Files are persisted in reverse staging order, so a bundle staged
    /// before its map is only replaced once the new map is in place. The
    /// returned paths keep staging order.
    pub fn commit(self) -> Result<Vec<PathBuf>, BuildError> {
        let mut written = Vec::with_capacity(self.pending.len());
        for (temp, path) in self.pending.into_iter().rev() {
            temp.persist(&path).map_err(|e| BuildError::io(&path, e.error))?;
            tracing::debug!(path = %path.display(), "wrote output");
            written.push(path);
        }
        written.reverse();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commit_writes_all_files() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("js/all.min.js");
        let b = temp.path().join("js/all.min.js.map");

        let mut stage = StagedOutput::new();
        stage.write(&a, b"code").unwrap();
        stage.write(&b, b"{}").unwrap();
        assert_eq!(stage.len(), 2);

        let written = stage.commit().unwrap();
        assert_eq!(written, vec![a.clone(), b.clone()]);
        assert_eq!(fs::read_to_string(&a).unwrap(), "code");
        assert_eq!(fs::read_to_string(&b).unwrap(), "{}");
    }

    #[test]
    fn test_drop_without_commit_leaves_previous_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("all.min.js");
        fs::write(&path, "previous").unwrap();

        {
            let mut stage = StagedOutput::new();
            stage.write(&path, b"next").unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
        let entries = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_failed_map_keeps_previous_bundle() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("all.min.js");
        let map = temp.path().join("all.min.js.map");
        fs::write(&bundle, "previous").unwrap();
        fs::create_dir(&map).unwrap();
        fs::write(map.join("occupied"), "x").unwrap();

        let mut stage = StagedOutput::new();
        stage.write(&bundle, b"next").unwrap();
        stage.write(&map, b"{}").unwrap();

        let err = stage.commit().unwrap_err();
        assert!(matches!(err, BuildError::Io { ref path, .. } if *path == map));
        assert_eq!(fs::read_to_string(&bundle).unwrap(), "previous");
    }

    #[test]
    fn test_commit_overwrites_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("all.min.js");
        fs::write(&path, "previous").unwrap();

        let mut stage = StagedOutput::new();
        stage.write(&path, b"next").unwrap();
        stage.commit().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "next");
    }
}

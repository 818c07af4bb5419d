//! Per-batch directory layout and temporary-artifact tracking.
//!
//! A [`WorkspaceLayout`] owns the archive directory path and a scratch
//! directory created with [`tempfile`]; the scratch directory is removed when
//! the layout is closed or dropped, whatever way the batch ended.
//! [`TempFiles`] does the same for individual artifacts of one source.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::files::{ensure_directory, remove_item};

/// Create a uniquely named scratch directory `<prefix>XXXXXX` in `parent`.
pub fn scratch_dir_in(parent: &Path, prefix: &str) -> wf_core::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(parent)
        .map_err(|e| wf_core::Error::filesystem(parent, e))
}

/// Remove a scratch directory now, logging any failure.
pub fn close_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => tracing::debug!("Removed scratch directory {}", path.display()),
        Err(e) => {
            tracing::warn!("Failed to remove scratch directory {}: {e}", path.display());
            remove_item(&path);
        }
    }
}

/// Paths derived for one batch.
#[derive(Debug)]
pub struct WorkspaceLayout {
    work_dir: PathBuf,
    archive_dir: PathBuf,
    scratch: Option<TempDir>,
}

impl WorkspaceLayout {
    /// Create the archive directory and a fresh scratch directory inside
    /// `work_dir`.
    ///
    /// On failure nothing created here is left behind.
    pub fn create(work_dir: &Path, archive_dir_name: &str, scratch_prefix: &str) -> wf_core::Result<Self> {
        let archive_dir = work_dir.join(archive_dir_name);
        let archive_existed = archive_dir.is_dir();
        ensure_directory(&archive_dir)?;

        let scratch = scratch_dir_in(work_dir, scratch_prefix).map_err(|e| {
            if !archive_existed {
                // Only succeeds while still empty.
                let _ = std::fs::remove_dir(&archive_dir);
            }
            e
        })?;

        tracing::debug!(
            work_dir = %work_dir.display(),
            scratch = %scratch.path().display(),
            "Workspace ready"
        );

        Ok(Self {
            work_dir: work_dir.to_path_buf(),
            archive_dir,
            scratch: Some(scratch),
        })
    }

    /// Directory receiving final outputs.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Directory receiving archived originals.
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Scratch directory for intermediate artifacts.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .unwrap_or(self.work_dir.as_path())
    }

    /// Remove the scratch directory now, logging any failure.
    pub fn close(mut self) {
        self.remove_scratch();
    }

    fn remove_scratch(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            close_scratch(scratch);
        }
    }
}

impl Drop for WorkspaceLayout {
    fn drop(&mut self) {
        self.remove_scratch();
    }
}

/// Temporary artifacts of one source, removed on drop.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path` for removal and hand it back.
    pub fn register(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    /// Stop tracking `path` (it was moved to its final place).
    pub fn release(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            remove_item(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn layout_creates_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::create(dir.path(), "Antigos", ".wallforge-temp").unwrap();

        let scratch = layout.scratch_dir().to_path_buf();
        assert!(layout.archive_dir().is_dir());
        assert!(scratch.is_dir());
        assert!(scratch.starts_with(dir.path()));
        assert!(scratch
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".wallforge-temp"));

        fs::write(scratch.join("clip.mp4"), b"x").unwrap();
        layout.close();
        assert!(!scratch.exists());
        assert!(dir.path().join("Antigos").is_dir());
    }

    #[test]
    fn drop_removes_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = {
            let layout = WorkspaceLayout::create(dir.path(), "Antigos", ".wf").unwrap();
            layout.scratch_dir().to_path_buf()
        };
        assert!(!scratch.exists());
    }

    #[test]
    fn two_layouts_get_distinct_scratch_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let a = WorkspaceLayout::create(dir.path(), "Antigos", ".wf").unwrap();
        let b = WorkspaceLayout::create(dir.path(), "Antigos", ".wf").unwrap();
        assert_ne!(a.scratch_dir(), b.scratch_dir());
    }

    #[test]
    fn unwritable_work_dir_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let err = WorkspaceLayout::create(&blocker, "Antigos", ".wf").unwrap_err();
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn temp_files_removed_unless_released() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("keep.mp4");
        let drop_me = dir.path().join("drop.mp4");
        fs::write(&keep, b"k").unwrap();
        fs::write(&drop_me, b"d").unwrap();

        {
            let mut temps = TempFiles::new();
            temps.register(keep.clone());
            temps.register(drop_me.clone());
            temps.release(&keep);
            assert_eq!(temps.len(), 1);
        }

        assert!(keep.exists());
        assert!(!drop_me.exists());
    }
}

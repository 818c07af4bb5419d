//! File lifecycle helpers: directory creation, moves, best-effort removal and
//! collision-free naming.
//!
//! Directory-creation and move failures surface as
//! [`wf_core::Error::Filesystem`]; removal never fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Create `path` and all missing ancestors. Succeeds if it already exists.
pub fn ensure_directory(path: &Path) -> wf_core::Result<()> {
    std::fs::create_dir_all(path).map_err(|e| wf_core::Error::filesystem(path, e))
}

/// Rename `src` to `dst`. The caller makes sure `dst`'s parent exists.
pub fn move_file(src: &Path, dst: &Path) -> wf_core::Result<()> {
    std::fs::rename(src, dst).map_err(|e| wf_core::Error::filesystem(dst, e))?;
    tracing::debug!("Moved {} -> {}", src.display(), dst.display());
    Ok(())
}

/// Recursively delete a file or directory. "Not found" is ignored and any
/// other failure is only logged.
pub fn remove_item(path: &Path) {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            tracing::warn!("Failed to stat {} for removal: {e}", path.display());
            return;
        }
    };

    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {e}", path.display()),
    }
}

/// Replace characters that are illegal in file names on common filesystems
/// (and control characters) with `-`.
pub fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| match c {
            '\\' | '/' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

/// First free name among `base.ext`, `base_1.ext`, `base_2.ext`, ... in
/// `directory`. `extension` may be given with or without the leading dot.
///
/// Only checks existence; the name is not reserved. Callers racing on the
/// same directory must hold that directory's lock (see [`DirectoryLocks`])
/// until the file has been created.
pub fn unique_name(directory: &Path, base_name: &str, extension: &str) -> String {
    let base = sanitize_file_stem(base_name);
    let ext = extension.trim_start_matches('.');
    let with_ext = |stem: &str| {
        if ext.is_empty() {
            stem.to_string()
        } else {
            format!("{stem}.{ext}")
        }
    };

    let candidate = with_ext(&base);
    if !directory.join(&candidate).exists() {
        return candidate;
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = with_ext(&format!("{base}_{counter}"));
        if !directory.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

// ---------------------------------------------------------------------------
// DirectoryLocks
// ---------------------------------------------------------------------------

/// Per-directory async mutexes serializing name-then-move sequences.
#[derive(Debug, Default, Clone)]
pub struct DirectoryLocks {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, directory: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(directory.to_path_buf())
            .or_default()
            .clone()
    }

    /// Move `file` into `directory` under a unique variant of `base_name`,
    /// holding the directory's lock across the existence check and the move.
    pub async fn move_unique(
        &self,
        file: &Path,
        directory: &Path,
        base_name: &str,
        extension: &str,
    ) -> wf_core::Result<PathBuf> {
        let lock = self.lock_for(directory);
        let _guard = lock.lock().await;
        let name = unique_name(directory, base_name, extension);
        let dest = directory.join(name);
        move_file(file, &dest)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn ensure_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_directory(&nested).unwrap();
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_directory_over_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();
        let err = ensure_directory(&file.join("sub")).unwrap_err();
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn move_file_renames() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.mp4");
        let dst = dir.path().join("b.mp4");
        fs::write(&src, b"data").unwrap();
        move_file(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"data");
    }

    #[test]
    fn move_missing_file_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = move_file(&dir.path().join("nope"), &dir.path().join("b")).unwrap_err();
        assert!(matches!(err, wf_core::Error::Filesystem { .. }));
    }

    #[test]
    fn remove_item_handles_files_dirs_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.tmp");
        let sub = dir.path().join("scratch");
        fs::write(&file, b"x").unwrap();
        fs::create_dir_all(sub.join("deep")).unwrap();
        fs::write(sub.join("deep").join("g.tmp"), b"y").unwrap();

        remove_item(&file);
        remove_item(&sub);
        remove_item(&dir.path().join("never-existed"));

        assert!(!file.exists());
        assert!(!sub.exists());
    }

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_file_stem("a/b\\c?d%e*f:g|h\"i<j>k"), "a-b-c-d-e-f-g-h-i-j-k");
        assert_eq!(sanitize_file_stem("tab\there"), "tab-here");
        assert_eq!(sanitize_file_stem("18102026_WIDE_Loja 1"), "18102026_WIDE_Loja 1");
    }

    #[test]
    fn unique_name_is_stable_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_name(dir.path(), "18102026_WIDE_C", ".mp4");
        for _ in 0..5 {
            assert_eq!(unique_name(dir.path(), "18102026_WIDE_C", ".mp4"), first);
        }
        assert_eq!(first, "18102026_WIDE_C.mp4");
    }

    #[test]
    fn unique_name_tries_suffixes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("X.mp4"), b"").unwrap();
        assert_eq!(unique_name(dir.path(), "X", "mp4"), "X_1.mp4");
        fs::write(dir.path().join("X_1.mp4"), b"").unwrap();
        assert_eq!(unique_name(dir.path(), "X", "mp4"), "X_2.mp4");
    }

    #[test]
    fn unique_name_sanitizes() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_name(dir.path(), "a:b", ".mp4"), "a-b.mp4");
    }

    #[tokio::test]
    async fn concurrent_moves_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        ensure_directory(&out).unwrap();
        let locks = DirectoryLocks::new();

        let mut handles = Vec::new();
        for i in 0..8 {
            let src = dir.path().join(format!("tmp_{i}.mp4"));
            fs::write(&src, format!("{i}")).unwrap();
            let locks = locks.clone();
            let out = out.clone();
            handles.push(tokio::spawn(async move {
                locks.move_unique(&src, &out, "SAME", "mp4").await
            }));
        }

        let mut finals = Vec::new();
        for h in handles {
            finals.push(h.await.unwrap().unwrap());
        }
        finals.sort();
        finals.dedup();
        assert_eq!(finals.len(), 8);
        assert_eq!(fs::read_dir(&out).unwrap().count(), 8);
    }
}

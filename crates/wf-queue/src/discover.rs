//! Expand user-supplied paths into batch sources.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use wf_core::is_supported_source;

/// Expand `paths` into supported source files.
///
/// A directory contributes its direct children with a supported extension,
/// sorted by name; a file is kept if its extension is supported. Paths are
/// canonicalized, order is preserved and duplicates are dropped. Unreadable
/// paths are logged and skipped.
pub fn discover_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    let mut keep = |path: &Path| {
        if !is_supported_source(path) {
            tracing::debug!(path = %path.display(), "Skipping unsupported file");
            return;
        }
        match path.canonicalize() {
            Ok(abs) => {
                if seen.insert(abs.clone()) {
                    found.push(abs);
                }
            }
            Err(e) => tracing::warn!(path = %path.display(), "Cannot resolve source: {e}"),
        }
    };

    for path in paths {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Skipping unreadable path: {e}");
                continue;
            }
        };

        if !meta.is_dir() {
            keep(path);
            continue;
        }

        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "Error reading directory");
                    None
                }
            })
        {
            if entry.file_type().is_file() {
                keep(entry.path());
            }
        }
    }

    tracing::debug!("Discovered {} source(s) from {} path(s)", found.len(), paths.len());
    found
}

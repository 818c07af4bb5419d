//! In-process [`RenderInvoker`] and fixtures for engine tests.
//!
//! Compiled for this crate's unit tests and, through the `test-util`
//! feature, for the workspace integration tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use wf_av::{ProgressFn, RenderInvoker, RenderRequest};
use wf_core::preset::{default_records, normalize_all};
use wf_core::{Error, MediaInfo, Preset};

/// Probes from a table, "renders" by writing the output file after a delay,
/// and counts how many renders overlap.
///
/// Unknown files probe as 1920x1080, 10 seconds.
pub struct FakeInvoker {
    default_info: MediaInfo,
    infos: Mutex<HashMap<String, MediaInfo>>,
    unprobeable: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    without_output: Mutex<HashSet<String>>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<RenderRequest>>,
}

struct Active<'a>(&'a AtomicUsize);

impl Drop for Active<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl FakeInvoker {
    pub fn new(delay: Duration) -> Self {
        Self {
            default_info: MediaInfo::new(1920, 1080, 10.0),
            infos: Mutex::default(),
            unprobeable: Mutex::default(),
            failing: Mutex::default(),
            without_output: Mutex::default(),
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            requests: Mutex::default(),
        }
    }

    pub fn with_info(self, name: &str, info: MediaInfo) -> Self {
        self.infos.lock().insert(name.to_string(), info);
        self
    }

    pub fn unprobeable(self, name: &str) -> Self {
        self.unprobeable.lock().insert(name.to_string());
        self
    }

    /// Fail every render whose label is `label`.
    pub fn failing(self, label: &str) -> Self {
        self.failing.lock().insert(label.to_string());
        self
    }

    /// Report success for renders labelled `label` without writing the
    /// output file.
    pub fn without_output(self, label: &str) -> Self {
        self.without_output.lock().insert(label.to_string());
        self
    }

    /// Let every render succeed from now on.
    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().clone()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl RenderInvoker for FakeInvoker {
    async fn probe(&self, path: &Path) -> Option<MediaInfo> {
        let name = file_name(path);
        if self.unprobeable.lock().contains(&name) {
            return None;
        }
        Some(self.infos.lock().get(&name).copied().unwrap_or(self.default_info))
    }

    async fn render(
        &self,
        request: &RenderRequest,
        on_progress: ProgressFn<'_>,
        cancel: Option<CancellationToken>,
    ) -> wf_core::Result<()> {
        self.requests.lock().push(request.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = Active(&self.active);

        on_progress(10);
        let cancel = cancel.unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        }
        on_progress(60);

        if self.failing.lock().contains(&request.label) {
            return Err(Error::render(&request.label, "exit status 1: simulated failure"));
        }
        if !self.without_output.lock().contains(&request.label) {
            std::fs::write(&request.output, b"rendered")?;
        }
        on_progress(100);
        Ok(())
    }
}

/// The built-in presets, normalized.
pub fn presets() -> Vec<Preset> {
    normalize_all(&default_records()).unwrap()
}

/// 18 October 2026, stamped `18102026`.
pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

/// Create small source files in `dir`.
pub fn touch_all(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"source").unwrap();
            path
        })
        .collect()
}

/// Scratch directories left in `dir`.
pub fn leftover_scratch(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| file_name(p).starts_with(prefix))
        .collect()
}

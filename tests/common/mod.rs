//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which owns a temporary working directory, a
//! scripted [`FakeInvoker`] and a [`QueueEngine`] wired to both, so batches
//! run end to end without ffmpeg.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use wf_core::config::QueueConfig;
use wf_core::events::{Event, EventBus};
use wf_queue::testing::{date, presets, touch_all};
use wf_queue::{Batch, QueueEngine};

pub use wf_queue::testing::FakeInvoker;

pub struct TestHarness {
    pub dir: TempDir,
    pub invoker: Arc<FakeInvoker>,
    pub events: Arc<EventBus>,
    pub engine: Arc<QueueEngine>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_invoker(fake())
    }

    pub fn with_invoker(invoker: FakeInvoker) -> Self {
        Self::with_config(invoker, QueueConfig::default())
    }

    pub fn with_config(invoker: FakeInvoker, config: QueueConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let invoker = Arc::new(invoker);
        let events = Arc::new(EventBus::default());
        let engine = Arc::new(QueueEngine::new(
            invoker.clone(),
            config,
            Arc::clone(&events),
        ));
        Self {
            dir,
            invoker,
            events,
            engine,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create source files with dummy content.
    pub fn sources(&self, names: &[&str]) -> Vec<PathBuf> {
        touch_all(self.path(), names)
    }

    /// A batch over `sources` with the built-in presets, dated `18102026`.
    pub fn batch(&self, sources: Vec<PathBuf>) -> Batch {
        Batch::new(sources, presets()).with_date(date())
    }

    /// File names directly inside `dir`, sorted.
    pub fn listing(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.path().join("Antigos")
    }
}

/// A fake invoker with a short render delay.
pub fn fake() -> FakeInvoker {
    FakeInvoker::new(Duration::from_millis(5))
}

/// Everything currently queued on `rx`.
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

//! The batch engine: dispatches one task per source into a bounded worker
//! pool and exposes pause, resume and cancel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinSet;
use wf_av::{DirectoryLocks, RenderInvoker, WorkspaceLayout};
use wf_core::config::{EncoderSettings, QueueConfig};
use wf_core::events::{EventBus, EventPayload};
use wf_core::{BatchId, Error, Preset, Result, SourceId, SourceItem, SourceStatus};
use wf_rules::{date_stamp, NamingTable, DEFAULT_CLIENT_LABEL};

use crate::control::{QueueControl, QueueStateSnapshot};
use crate::job::{self, BatchContext};
use crate::log::BatchLog;
use crate::sources::SourceTable;
use crate::superled::SuperLedComposer;

/// One batch submission.
#[derive(Debug, Clone)]
pub struct Batch {
    pub sources: Vec<PathBuf>,
    pub presets: Vec<Preset>,
    pub client_label: String,
    pub encoder: EncoderSettings,
    /// Date stamped into output names.
    pub date: NaiveDate,
}

impl Batch {
    pub fn new(sources: Vec<PathBuf>, presets: Vec<Preset>) -> Self {
        Self {
            sources,
            presets,
            client_label: DEFAULT_CLIENT_LABEL.to_string(),
            encoder: EncoderSettings::default(),
            date: Local::now().date_naive(),
        }
    }

    pub fn with_client_label(mut self, label: impl Into<String>) -> Self {
        self.client_label = label.into();
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderSettings) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }
}

/// Outcome of [`QueueEngine::run_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    /// The sources of this batch, in submission order.
    pub sources: Vec<SourceItem>,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Every output produced, in source order.
    pub outputs: Vec<PathBuf>,
    /// Set when a filesystem failure aborted the batch.
    pub aborted: Option<String>,
    /// The accumulated textual log.
    pub log: String,
}

impl BatchReport {
    fn empty(batch_id: BatchId, log: String) -> Self {
        Self {
            batch_id,
            sources: Vec::new(),
            completed: 0,
            failed: 0,
            cancelled: 0,
            outputs: Vec::new(),
            aborted: None,
            log,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Clears the running flag on drop.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::Conflict("a batch is already running".into()))?;
        Ok(Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Batch transcoding engine. One batch runs at a time; control methods may
/// be called concurrently from any task.
pub struct QueueEngine {
    invoker: Arc<dyn RenderInvoker>,
    config: QueueConfig,
    events: Arc<EventBus>,
    control: Arc<QueueControl>,
    sources: Arc<SourceTable>,
    naming: Arc<NamingTable>,
    locks: DirectoryLocks,
    log: Arc<BatchLog>,
    running: AtomicBool,
    /// Held while a batch claims `running` and arms its token, and while
    /// `cancel` checks both.
    start: Mutex<()>,
}

impl QueueEngine {
    pub fn new(invoker: Arc<dyn RenderInvoker>, config: QueueConfig, events: Arc<EventBus>) -> Self {
        let control = Arc::new(QueueControl::new(config.effective_concurrency()));
        Self {
            invoker,
            config,
            events,
            control,
            sources: Arc::new(SourceTable::new()),
            naming: Arc::new(NamingTable::default()),
            locks: DirectoryLocks::new(),
            log: Arc::new(BatchLog::new()),
            running: AtomicBool::new(false),
            start: Mutex::new(()),
        }
    }

    /// Replace the built-in naming table.
    pub fn with_naming(mut self, naming: NamingTable) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn naming(&self) -> &NamingTable {
        &self.naming
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // -- control surface ----------------------------------------------------

    /// Stop starting new preset renders. In-flight renders finish.
    pub fn pause(&self) -> bool {
        if !self.control.pause() {
            return false;
        }
        tracing::info!("Queue paused");
        self.log.append("Queue paused");
        self.events.broadcast(EventPayload::QueuePaused);
        true
    }

    pub fn resume(&self) -> bool {
        if !self.control.resume() {
            return false;
        }
        tracing::info!("Queue resumed");
        self.log.append("Queue resumed");
        self.events.broadcast(EventPayload::QueueResumed);
        true
    }

    /// Cancel the running batch: undispatched sources are discarded and
    /// workers stop at their next checkpoint. No-op when idle.
    pub fn cancel(&self) -> bool {
        {
            let _start = self.start.lock();
            if !self.is_running() || !self.control.cancel() {
                return false;
            }
        }
        tracing::info!("Queue cancelled");
        self.log.append("Queue cancelled");
        self.events.broadcast(EventPayload::QueueCancelled);
        true
    }

    pub fn state(&self) -> QueueStateSnapshot {
        self.control.snapshot()
    }

    /// Every known source in submission order.
    pub fn sources(&self) -> Vec<SourceItem> {
        self.sources.snapshot()
    }

    /// Drop completed, failed and cancelled items.
    pub fn forget_finished(&self) -> usize {
        let dropped = self.sources.forget_finished();
        tracing::debug!("Forgot {dropped} finished source(s)");
        dropped
    }

    /// A SuperLED composer sharing this engine's invoker, events and locks.
    pub fn superled(&self, encoder: EncoderSettings) -> SuperLedComposer {
        SuperLedComposer::new(Arc::clone(&self.invoker), Arc::clone(&self.events), encoder)
            .with_naming(Arc::clone(&self.naming))
            .with_locks(self.locks.clone())
    }

    // -- batch --------------------------------------------------------------

    /// Run a batch to completion.
    ///
    /// Returns [`Error::Conflict`] if a batch is already running. Per-source
    /// failures and a batch abort are reported in the [`BatchReport`].
    pub async fn run_batch(&self, batch: Batch) -> Result<BatchReport> {
        let (_running, cancel) = {
            let _start = self.start.lock();
            let running = RunningGuard::acquire(&self.running)?;
            (running, self.control.begin_batch())
        };
        self.log.clear();

        let batch_id = BatchId::new();
        if batch.sources.is_empty() || batch.presets.is_empty() {
            self.log.append(format!(
                "Nothing to do: {} source(s), {} preset(s)",
                batch.sources.len(),
                batch.presets.len()
            ));
            return Ok(BatchReport::empty(batch_id, self.log.text()));
        }

        let ids = self.register(&batch.sources);
        let Some(first) = ids.first().and_then(|id| self.sources.get(*id)) else {
            self.log.append("Nothing to do: every source already completed");
            return Ok(BatchReport::empty(batch_id, self.log.text()));
        };
        let work_dir = first
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        tracing::info!(
            batch_id = %batch_id,
            sources = ids.len(),
            presets = batch.presets.len(),
            work_dir = %work_dir.display(),
            "Starting batch"
        );

        let layout = match WorkspaceLayout::create(
            &work_dir,
            &self.config.archive_dir_name,
            &self.config.scratch_prefix,
        ) {
            Ok(layout) => layout,
            Err(e) => return Ok(self.abort_before_start(batch_id, &ids, e)),
        };

        self.log.append(format!(
            "Batch started: {} source(s), {} preset(s)",
            ids.len(),
            batch.presets.len()
        ));
        self.events.broadcast(EventPayload::BatchStarted {
            batch_id,
            sources: ids.len(),
            presets: batch.presets.len(),
        });

        let ctx = Arc::new(BatchContext {
            batch_id,
            invoker: Arc::clone(&self.invoker),
            config: self.config.clone(),
            events: Arc::clone(&self.events),
            control: Arc::clone(&self.control),
            sources: Arc::clone(&self.sources),
            naming: Arc::clone(&self.naming),
            locks: self.locks.clone(),
            log: Arc::clone(&self.log),
            presets: batch.presets,
            encoder: batch.encoder,
            client_label: batch.client_label,
            date_stamp: date_stamp(batch.date),
            work_dir: layout.work_dir().to_path_buf(),
            archive_dir: layout.archive_dir().to_path_buf(),
            scratch_dir: layout.scratch_dir().to_path_buf(),
            cancel: cancel.clone(),
            abort: Mutex::new(None),
        });

        let mut tasks = JoinSet::new();
        let mut queue = ids.iter().copied();
        let mut undispatched = Vec::new();

        for id in queue.by_ref() {
            if !self.control.wait_until_resumed(&cancel).await {
                undispatched.push(id);
                break;
            }
            let Some(slot) = self.control.acquire(&cancel).await else {
                undispatched.push(id);
                break;
            };

            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move {
                let _slot = slot;
                if let Err(e) = job::process_source(&ctx, id).await {
                    ctx.abort_with(&e);
                }
            });
        }
        undispatched.extend(queue);

        for id in undispatched {
            ctx.cancel_source(id);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {e}");
            }
        }
        self.settle_stragglers(&ids);

        layout.close();

        let aborted = ctx.abort.lock().take();
        let report = self.report(batch_id, &ids, aborted);

        match &report.aborted {
            Some(error) => self.events.broadcast(EventPayload::BatchAborted {
                batch_id,
                error: error.clone(),
            }),
            None => self.events.broadcast(EventPayload::BatchFinished {
                batch_id,
                completed: report.completed,
                failed: report.failed,
                cancelled: report.cancelled,
            }),
        }
        tracing::info!(
            batch_id = %batch_id,
            completed = report.completed,
            failed = report.failed,
            cancelled = report.cancelled,
            "Batch finished"
        );

        Ok(BatchReport {
            log: self.log.text(),
            ..report
        })
    }

    /// Add `paths` to the source table. Completed paths are skipped, failed
    /// and cancelled ones are re-entered.
    fn register(&self, paths: &[PathBuf]) -> Vec<SourceId> {
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            match self.sources.find_by_path(path) {
                Some(existing) if existing.status == SourceStatus::Completed => {
                    tracing::info!(source = %path.display(), "Already completed, skipping");
                    self.log
                        .append(format!("{}: already completed, skipped", existing.display_name()));
                }
                Some(existing) => {
                    if self.sources.reset_for_resubmit(existing.id) {
                        ids.push(existing.id);
                    } else {
                        tracing::warn!(
                            source = %path.display(),
                            status = %existing.status,
                            "Source is busy, skipping"
                        );
                    }
                }
                None => ids.push(self.sources.insert(SourceItem::new(path.clone()))),
            }
        }
        ids
    }

    fn abort_before_start(&self, batch_id: BatchId, ids: &[SourceId], error: Error) -> BatchReport {
        let message = error.to_string();
        tracing::error!(batch_id = %batch_id, "Cannot prepare workspace: {message}");
        self.log.append(format!("Batch aborted: {message}"));
        for id in ids {
            if self.sources.transition(*id, SourceStatus::Cancelled) {
                self.events
                    .broadcast(EventPayload::SourceCancelled { source_id: *id });
            }
        }
        self.events.broadcast(EventPayload::BatchAborted {
            batch_id,
            error: message.clone(),
        });
        BatchReport {
            log: self.log.text(),
            ..self.report(batch_id, ids, Some(message))
        }
    }

    /// Give every source of a finished batch an outcome, even if its worker
    /// died mid-way.
    fn settle_stragglers(&self, ids: &[SourceId]) {
        for id in ids {
            let Some(item) = self.sources.get(*id) else {
                continue;
            };
            let next = match item.status {
                SourceStatus::Discovered | SourceStatus::Pending => SourceStatus::Cancelled,
                SourceStatus::Probing => SourceStatus::ErrorProbing,
                SourceStatus::Processing => SourceStatus::Error,
                _ => continue,
            };
            tracing::warn!(source = %item.path.display(), "Source left in {}, marking {next}", item.status);
            self.sources.transition(*id, next);
            if next == SourceStatus::Error {
                self.sources
                    .set_error(*id, Some("worker stopped unexpectedly".into()));
            }
        }
    }

    fn report(&self, batch_id: BatchId, ids: &[SourceId], aborted: Option<String>) -> BatchReport {
        let sources: Vec<SourceItem> = ids.iter().filter_map(|id| self.sources.get(*id)).collect();
        let count = |pred: fn(SourceStatus) -> bool| sources.iter().filter(|s| pred(s.status)).count();

        BatchReport {
            batch_id,
            completed: count(|s| s == SourceStatus::Completed),
            failed: count(|s| matches!(s, SourceStatus::Error | SourceStatus::ErrorProbing)),
            cancelled: count(|s| s == SourceStatus::Cancelled),
            outputs: sources.iter().flat_map(|s| s.outputs.iter().cloned()).collect(),
            sources,
            aborted,
            log: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{date, leftover_scratch, presets, touch_all, FakeInvoker};
    use std::time::Duration;
    use wf_core::MediaInfo;

    fn engine(invoker: Arc<FakeInvoker>, config: QueueConfig) -> Arc<QueueEngine> {
        Arc::new(QueueEngine::new(invoker, config, Arc::new(EventBus::default())))
    }

    fn batch(sources: Vec<PathBuf>) -> Batch {
        Batch::new(sources, presets()).with_date(date())
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_limit() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"]);
        let invoker = FakeInvoker::new(Duration::from_millis(30)).into_arc();
        let engine = engine(invoker.clone(), QueueConfig::default());

        let report = engine.run_batch(batch(sources)).await.unwrap();

        assert_eq!(report.completed, 5);
        assert!(invoker.peak() <= 2, "peak {}", invoker.peak());
        let state = engine.state();
        assert_eq!(state.limit, 2);
        assert!(state.peak_in_flight <= 2);
        assert_eq!(state.in_flight, 0);
        assert!(leftover_scratch(dir.path(), ".wallforge-temp").is_empty());
    }

    #[tokio::test]
    async fn probe_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["bad.mp4", "good.mp4"]);
        let invoker = FakeInvoker::new(Duration::ZERO).unprobeable("bad.mp4").into_arc();
        let engine = engine(invoker, QueueConfig::default());
        let mut events = engine.events().subscribe();

        let report = engine.run_batch(batch(sources.clone())).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(report.sources[0].status, SourceStatus::ErrorProbing);
        assert_eq!(report.sources[1].status, SourceStatus::Completed);
        assert!(sources[0].exists(), "unprobeable original stays in place");

        let mut saw_probe_failed = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event.payload, EventPayload::SourceProbeFailed { .. }) {
                saw_probe_failed = true;
            }
        }
        assert!(saw_probe_failed);
    }

    #[tokio::test]
    async fn no_compatible_preset_completes_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["square.mp4"]);
        let invoker = FakeInvoker::new(Duration::ZERO)
            .with_info("square.mp4", MediaInfo::new(1000, 1000, 10.0))
            .into_arc();
        let engine = engine(invoker.clone(), QueueConfig::default());

        let report = engine.run_batch(batch(sources.clone())).await.unwrap();

        assert_eq!(report.completed, 1);
        assert!(report.outputs.is_empty());
        assert!(invoker.requests().is_empty());
        assert!(sources[0].exists());
        assert!(report.log.contains("no compatible preset"));
        assert!(report.sources[0]
            .error
            .as_deref()
            .is_some_and(|w| w.contains("1000x1000")));
    }

    #[tokio::test]
    async fn cancel_discards_undispatched_and_cleans_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
        let invoker = FakeInvoker::new(Duration::from_millis(150)).into_arc();
        let config = QueueConfig {
            concurrency: 1,
            ..QueueConfig::default()
        };
        let engine = engine(invoker, config);

        let run = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_batch(batch(sources)).await })
        };
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(engine.cancel());

        let report = run.await.unwrap().unwrap();
        assert!(report.cancelled >= 3, "{report:?}");
        assert!(report.sources[1..]
            .iter()
            .all(|s| s.status == SourceStatus::Cancelled));
        assert!(leftover_scratch(dir.path(), ".wallforge-temp").is_empty());
        assert!(!engine.cancel(), "cancel is a no-op once idle");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_right_after_start_reaches_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4", "b.mp4", "c.mp4"]);
        let invoker = FakeInvoker::new(Duration::ZERO).into_arc();
        let engine = engine(invoker.clone(), QueueConfig::default());
        // Paused, so nothing dispatches before the cancel lands.
        engine.pause();

        let run = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_batch(batch(sources)).await })
        };
        while !engine.is_running() {
            std::hint::spin_loop();
        }
        assert!(engine.cancel());

        let report = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("cancel was lost")
            .unwrap()
            .unwrap();
        assert_eq!(report.cancelled, 3, "{report:?}");
        assert!(invoker.requests().is_empty());
        assert!(engine.state().cancelled);
        engine.resume();
    }

    #[tokio::test]
    async fn kill_on_cancel_stops_running_render() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4"]);
        let invoker = FakeInvoker::new(Duration::from_secs(30)).into_arc();
        let config = QueueConfig {
            kill_on_cancel: true,
            ..QueueConfig::default()
        };
        let engine = engine(invoker, config);

        let run = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_batch(batch(sources)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("render was not killed")
            .unwrap()
            .unwrap();
        assert_eq!(report.cancelled, 1);
        assert!(report.outputs.is_empty());
        assert!(dir.path().join("a.mp4").exists());
    }

    #[tokio::test]
    async fn pause_holds_dispatch_until_resume() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4", "b.mp4"]);
        let invoker = FakeInvoker::new(Duration::ZERO).into_arc();
        let engine = engine(invoker.clone(), QueueConfig::default());

        assert!(engine.pause());
        assert!(!engine.pause());
        let run = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_batch(batch(sources)).await })
        };
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(invoker.requests().is_empty());
        assert!(engine.state().paused);

        assert!(engine.resume());
        let report = run.await.unwrap().unwrap();
        assert_eq!(report.completed, 2);
        assert!(report.log.contains("Queue resumed"));
    }

    #[tokio::test]
    async fn second_batch_while_running_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4"]);
        let invoker = FakeInvoker::new(Duration::from_millis(150)).into_arc();
        let engine = engine(invoker, QueueConfig::default());

        let run = {
            let engine = Arc::clone(&engine);
            let sources = sources.clone();
            tokio::spawn(async move { engine.run_batch(batch(sources)).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(engine.is_running());

        let err = engine.run_batch(batch(sources)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        run.await.unwrap().unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let invoker = FakeInvoker::new(Duration::ZERO).into_arc();
        let engine = engine(invoker, QueueConfig::default());
        let report = engine.run_batch(Batch::new(Vec::new(), presets())).await.unwrap();
        assert!(report.sources.is_empty());
        assert!(report.log.contains("Nothing to do"));
    }

    #[tokio::test]
    async fn unusable_work_dir_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4"]);
        // A file where the archive directory should go.
        std::fs::write(dir.path().join("Antigos"), b"taken").unwrap();
        let invoker = FakeInvoker::new(Duration::ZERO).into_arc();
        let engine = engine(invoker.clone(), QueueConfig::default());
        let mut events = engine.events().subscribe();

        let report = engine.run_batch(batch(sources)).await.unwrap();

        assert!(report.is_aborted());
        assert_eq!(report.cancelled, 1);
        assert!(invoker.requests().is_empty());
        let aborted = std::iter::from_fn(|| events.try_recv().ok())
            .any(|e| matches!(e.payload, EventPayload::BatchAborted { .. }));
        assert!(aborted);
    }

    #[tokio::test]
    async fn failed_output_move_aborts_remaining_sources() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4", "b.mp4", "c.mp4"]);
        // The render "succeeds" but leaves nothing to move out of scratch.
        let invoker = FakeInvoker::new(Duration::ZERO).without_output("WFHD").into_arc();
        let config = QueueConfig {
            concurrency: 1,
            ..QueueConfig::default()
        };
        let engine = engine(invoker.clone(), config);
        let mut events = engine.events().subscribe();

        let report = engine.run_batch(batch(sources.clone())).await.unwrap();

        let reason = report.aborted.as_deref().unwrap();
        assert!(reason.starts_with("Filesystem error"), "{reason}");
        assert_eq!(report.sources[0].status, SourceStatus::Error);
        assert!(report.sources[0].error.as_deref().is_some_and(|e| e.contains("Filesystem")));
        assert!(report.sources[1..]
            .iter()
            .all(|s| s.status == SourceStatus::Cancelled));
        assert_eq!((report.failed, report.cancelled, report.completed), (1, 2, 0));

        // Only the first source ever reached the invoker.
        assert!(invoker.requests().iter().all(|r| r.inputs == vec![sources[0].clone()]));
        assert!(sources.iter().all(|s| s.exists()), "nothing archived");
        assert!(leftover_scratch(dir.path(), ".wallforge-temp").is_empty());
        assert!(report.log.contains("Batch aborted"));

        let payloads: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.payload)
            .collect();
        assert!(matches!(payloads.last(), Some(EventPayload::BatchAborted { .. })));
        assert!(!payloads
            .iter()
            .any(|p| matches!(p, EventPayload::BatchFinished { .. })));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn forget_finished_clears_table() {
        let dir = tempfile::tempdir().unwrap();
        let sources = touch_all(dir.path(), &["a.mp4", "b.mp4"]);
        let invoker = FakeInvoker::new(Duration::ZERO).into_arc();
        let engine = engine(invoker, QueueConfig::default());

        engine.run_batch(batch(sources)).await.unwrap();
        assert_eq!(engine.sources().len(), 2);
        assert_eq!(engine.forget_finished(), 2);
        assert!(engine.sources().is_empty());
    }
}

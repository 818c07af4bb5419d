//! The per-source pipeline run by one worker slot.
//!
//! probe -> (still image: synthesize a clip) -> filter compatible presets ->
//! render each preset in order -> name and move outputs -> archive the
//! original. Temporary artifacts are dropped on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use wf_av::files::sanitize_file_stem;
use wf_av::filter::{preset_filter, render_duration, still_clip_filter};
use wf_av::{DirectoryLocks, RenderInvoker, RenderRequest, TempFiles};
use wf_core::config::{EncoderSettings, QueueConfig};
use wf_core::events::{EventBus, EventPayload};
use wf_core::{BatchId, Error, MediaInfo, Preset, Result, SourceId, SourceItem, SourceKind, SourceStatus};
use wf_rules::{compatible_presets, NamingTable};

use crate::control::QueueControl;
use crate::log::BatchLog;
use crate::sources::SourceTable;

/// Everything a worker needs for one batch. Shared by all workers.
pub(crate) struct BatchContext {
    pub batch_id: BatchId,
    pub invoker: Arc<dyn RenderInvoker>,
    pub config: QueueConfig,
    pub events: Arc<EventBus>,
    pub control: Arc<QueueControl>,
    pub sources: Arc<SourceTable>,
    pub naming: Arc<NamingTable>,
    pub locks: DirectoryLocks,
    pub log: Arc<BatchLog>,
    pub presets: Vec<Preset>,
    pub encoder: EncoderSettings,
    pub client_label: String,
    pub date_stamp: String,
    pub work_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub cancel: CancellationToken,
    /// First batch-fatal error, if any.
    pub abort: Mutex<Option<String>>,
}

impl BatchContext {
    /// Record a batch-fatal error and stop further dispatch.
    pub fn abort_with(&self, error: &Error) {
        {
            let mut abort = self.abort.lock();
            if abort.is_none() {
                *abort = Some(error.to_string());
            }
        }
        tracing::error!(batch_id = %self.batch_id, "Aborting batch: {error}");
        self.log.append(format!("Batch aborted: {error}"));
        self.cancel.cancel();
    }

    /// Token handed to renders, only when in-flight renders may be killed.
    fn render_cancel(&self) -> Option<CancellationToken> {
        self.config.kill_on_cancel.then(|| self.cancel.clone())
    }

    fn output_extension(&self) -> &str {
        self.config.output_extension.trim_start_matches('.')
    }

    fn note(&self, item: &SourceItem, message: impl AsRef<str>) {
        self.log.append(format!("{}: {}", item.display_name(), message.as_ref()));
    }

    /// Mark a source cancelled before it started processing.
    pub fn cancel_source(&self, id: SourceId) {
        if self.sources.transition(id, SourceStatus::Cancelled) {
            if let Some(item) = self.sources.get(id) {
                self.note(&item, "cancelled");
            }
            self.events
                .broadcast(EventPayload::SourceCancelled { source_id: id });
        }
    }

    fn fail_source(&self, item: &SourceItem, message: String) {
        tracing::error!(source = %item.path.display(), "Source failed: {message}");
        self.note(item, format!("error: {message}"));
        self.sources.transition(item.id, SourceStatus::Error);
        self.sources.set_error(item.id, Some(message.clone()));
        self.events.broadcast(EventPayload::SourceFailed {
            source_id: item.id,
            error: message,
        });
    }
}

/// Short, stable tag for scratch file names.
fn short_id(id: SourceId) -> String {
    id.to_string().chars().take(8).collect()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "source".to_string())
}

/// Run the whole pipeline for source `id`.
///
/// Per-source failures are recorded on the source and return `Ok`. Only
/// batch-fatal errors are returned.
pub(crate) async fn process_source(ctx: &BatchContext, id: SourceId) -> Result<()> {
    let Some(item) = ctx.sources.get(id) else {
        return Ok(());
    };

    ctx.sources.transition(id, SourceStatus::Probing);
    ctx.events.broadcast(EventPayload::SourceStarted {
        source_id: id,
        path: item.path.clone(),
    });
    tracing::info!(source = %item.path.display(), "Probing source");

    let Some(info) = ctx.invoker.probe(&item.path).await else {
        tracing::warn!(source = %item.path.display(), "Probe failed");
        ctx.note(&item, "could not read media metadata");
        ctx.sources.transition(id, SourceStatus::ErrorProbing);
        ctx.sources
            .set_error(id, Some("could not read media metadata".to_string()));
        ctx.events.broadcast(EventPayload::SourceProbeFailed {
            source_id: id,
            path: item.path.clone(),
        });
        return Ok(());
    };
    ctx.sources.set_info(id, info);
    ctx.sources.transition(id, SourceStatus::Pending);
    ctx.note(&item, format!("probed {info}"));

    if ctx.cancel.is_cancelled() {
        ctx.cancel_source(id);
        return Ok(());
    }
    ctx.sources.transition(id, SourceStatus::Processing);

    let mut temps = TempFiles::new();

    let (input, info) = match item.kind {
        SourceKind::Video => (item.path.clone(), info),
        SourceKind::Image => match synthesize_clip(ctx, &item, info, &mut temps).await {
            Ok(clip) => clip,
            Err(Error::Cancelled) => {
                finish_cancelled(ctx, &item);
                return Ok(());
            }
            Err(e) if e.is_batch_fatal() => {
                ctx.fail_source(&item, e.to_string());
                return Err(e);
            }
            Err(e) => {
                ctx.fail_source(&item, format!("still image conversion failed: {e}"));
                return Ok(());
            }
        },
    };

    let presets = compatible_presets(Some(&info), &ctx.presets);
    if presets.is_empty() {
        let warning = format!("no compatible preset for {info}");
        tracing::warn!(source = %item.path.display(), "{warning}");
        ctx.note(&item, &warning);
        ctx.sources.set_error(id, Some(warning.clone()));
        ctx.sources.transition(id, SourceStatus::Completed);
        ctx.events.broadcast(EventPayload::SourceCompleted {
            source_id: id,
            outputs: Vec::new(),
            warning: Some(warning),
        });
        return Ok(());
    }

    let mut failures = Vec::new();
    let mut cancelled = false;

    for preset in presets {
        // Cooperative checkpoint: pause holds here, cancel stops here.
        if !ctx.control.wait_until_resumed(&ctx.cancel).await {
            cancelled = true;
            break;
        }

        match render_preset(ctx, &item, &input, info, preset, &mut temps).await {
            Ok(output) => {
                tracing::info!(
                    source = %item.path.display(),
                    preset = %preset.id,
                    output = %output.display(),
                    "Preset rendered"
                );
                ctx.note(&item, format!("{} -> {}", preset.id, output.display()));
                ctx.sources.push_output(id, output);
            }
            Err(Error::Cancelled) => {
                ctx.note(&item, format!("{} killed by cancellation", preset.id));
                cancelled = true;
                break;
            }
            Err(e) if e.is_batch_fatal() => {
                ctx.fail_source(&item, e.to_string());
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(source = %item.path.display(), preset = %preset.id, "Render failed: {e}");
                ctx.note(&item, format!("{} failed: {e}", preset.id));
                failures.push(e.to_string());
            }
        }
    }

    let outputs = ctx
        .sources
        .get(id)
        .map(|i| i.outputs)
        .unwrap_or_default();

    if !outputs.is_empty() && item.kind == SourceKind::Video {
        match archive_original(ctx, &item.path).await {
            Ok(archived) => ctx.note(&item, format!("archived to {}", archived.display())),
            Err(e) => {
                ctx.fail_source(&item, e.to_string());
                return Err(e);
            }
        }
    }

    if cancelled {
        finish_cancelled(ctx, &item);
    } else if outputs.is_empty() {
        ctx.fail_source(&item, failures.join("; "));
    } else {
        let warning = (!failures.is_empty()).then(|| failures.join("; "));
        ctx.sources.set_error(id, warning.clone());
        ctx.sources.transition(id, SourceStatus::Completed);
        ctx.note(&item, format!("completed with {} output(s)", outputs.len()));
        ctx.events.broadcast(EventPayload::SourceCompleted {
            source_id: id,
            outputs,
            warning,
        });
    }

    Ok(())
}

fn finish_cancelled(ctx: &BatchContext, item: &SourceItem) {
    tracing::info!(source = %item.path.display(), "Source cancelled");
    ctx.note(item, "cancelled");
    ctx.sources.transition(item.id, SourceStatus::Cancelled);
    ctx.events
        .broadcast(EventPayload::SourceCancelled { source_id: item.id });
}

/// Turn a still image into a looped clip at its native size. The clip
/// becomes the effective source.
async fn synthesize_clip(
    ctx: &BatchContext,
    item: &SourceItem,
    info: MediaInfo,
    temps: &mut TempFiles,
) -> Result<(PathBuf, MediaInfo)> {
    let secs = ctx.config.image_clip_secs;
    let clip = temps.register(ctx.scratch_dir.join(format!(
        "{}_clip_{}.{}",
        sanitize_file_stem(&file_stem(&item.path)),
        short_id(item.id),
        ctx.output_extension()
    )));

    tracing::debug!(source = %item.path.display(), clip = %clip.display(), "Synthesizing still clip");
    let request = RenderRequest::chain(
        "clip",
        &item.path,
        &clip,
        still_clip_filter(info.width, info.height),
        secs,
        ctx.encoder.clone(),
    )
    .looped();

    ctx.invoker
        .render(&request, &|_| {}, ctx.render_cancel())
        .await?;
    ctx.note(item, format!("converted still to {secs}s clip"));
    Ok((clip, info.with_duration(secs)))
}

/// Render one preset into scratch, then move it to its final unique name.
async fn render_preset(
    ctx: &BatchContext,
    item: &SourceItem,
    input: &Path,
    info: MediaInfo,
    preset: &Preset,
    temps: &mut TempFiles,
) -> Result<PathBuf> {
    let id = item.id;
    let ext = ctx.output_extension();
    ctx.sources.set_progress(id, 0, true);

    let temp = temps.register(ctx.scratch_dir.join(format!(
        "{}_{}_{}.{ext}",
        sanitize_file_stem(&file_stem(&item.path)),
        sanitize_file_stem(&preset.id),
        short_id(id)
    )));

    let request = RenderRequest::chain(
        &preset.id,
        input,
        &temp,
        preset_filter(preset, info.duration_secs),
        render_duration(preset, info.duration_secs),
        ctx.encoder.clone(),
    );

    let on_progress = |percent: u8| {
        if ctx.sources.set_progress(id, percent, false) {
            ctx.events.broadcast(EventPayload::SourceProgress {
                source_id: id,
                preset_id: preset.id.clone(),
                percent,
            });
        }
    };

    tracing::info!(source = %item.path.display(), preset = %preset.id, "Rendering");
    ctx.invoker
        .render(&request, &on_progress, ctx.render_cancel())
        .await?;

    let base = ctx.naming.base_name(preset, &ctx.client_label, &ctx.date_stamp);
    let output = ctx
        .locks
        .move_unique(&temp, &ctx.work_dir, &base, ext)
        .await?;
    temps.release(&temp);
    Ok(output)
}

async fn archive_original(ctx: &BatchContext, path: &Path) -> Result<PathBuf> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    ctx.locks
        .move_unique(path, &ctx.archive_dir, &file_stem(path), &ext)
        .await
}

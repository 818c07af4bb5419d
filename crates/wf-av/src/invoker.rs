//! The seam between the batch engine and the external media tool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wf_core::MediaInfo;

use crate::command::ToolCommand;
use crate::probe::FfprobeProber;
use crate::render::{ProgressTracker, RenderRequest};
use crate::tools::ToolRegistry;

/// Progress sink: receives monotonically non-decreasing percents 0..=100.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Probe and render operations the engine delegates to an external tool.
#[async_trait]
pub trait RenderInvoker: Send + Sync {
    /// Probe metadata. `None` means "cannot classify"; never an error.
    async fn probe(&self, path: &Path) -> Option<MediaInfo>;

    /// Run one render, streaming progress.
    ///
    /// Failures carry a human-readable diagnostic. When `cancel` is given and
    /// fires, the subprocess is stopped and [`wf_core::Error::Cancelled`] is
    /// returned.
    async fn render(
        &self,
        request: &RenderRequest,
        on_progress: ProgressFn<'_>,
        cancel: Option<CancellationToken>,
    ) -> wf_core::Result<()>;
}

/// [`RenderInvoker`] backed by ffmpeg and ffprobe.
#[derive(Debug, Clone)]
pub struct FfmpegInvoker {
    tools: Arc<ToolRegistry>,
}

impl FfmpegInvoker {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

#[async_trait]
impl RenderInvoker for FfmpegInvoker {
    async fn probe(&self, path: &Path) -> Option<MediaInfo> {
        let ffprobe = match self.tools.ffprobe() {
            Ok(p) => p.to_path_buf(),
            Err(e) => {
                tracing::warn!(source = %path.display(), "Cannot probe: {e}");
                return None;
            }
        };
        FfprobeProber::new(ffprobe).probe(path).await
    }

    async fn render(
        &self,
        request: &RenderRequest,
        on_progress: ProgressFn<'_>,
        cancel: Option<CancellationToken>,
    ) -> wf_core::Result<()> {
        let ffmpeg = self
            .tools
            .ffmpeg()
            .map_err(|e| wf_core::Error::render(&request.label, e.to_string()))?;

        let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
        cmd.no_timeout().args(request.ffmpeg_args());

        tracing::debug!(
            label = %request.label,
            output = %request.output.display(),
            "ffmpeg {}",
            cmd.get_args().join(" ")
        );

        let mut tracker = ProgressTracker::new(request.duration_secs);
        let result = cmd
            .execute_with_stderr_callback(
                |line| {
                    if let Some(pct) = tracker.observe(line) {
                        on_progress(pct);
                    }
                },
                cancel,
            )
            .await;

        match result {
            Ok(_) => {
                if let Some(pct) = tracker.finish() {
                    on_progress(pct);
                }
                Ok(())
            }
            Err(wf_core::Error::Cancelled) => Err(wf_core::Error::Cancelled),
            Err(wf_core::Error::Tool { message, .. }) => {
                Err(wf_core::Error::render(&request.label, message))
            }
            Err(other) => Err(other),
        }
    }
}

//! SuperLED composite: three panels of clips stacked into one 3648x1152
//! wall video.
//!
//! Each panel's clips are scaled to the panel size and joined or
//! freeze-extended to [`SUPERLED_SECS`]. The three panels are built
//! concurrently and then stacked side by side.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use wf_av::filter::{hstack_graph, panel_assemble_graph, panel_scale_filter};
use wf_av::{close_scratch, scratch_dir_in, DirectoryLocks, RenderInvoker, RenderRequest};
use wf_core::config::EncoderSettings;
use wf_core::events::{EventBus, EventPayload};
use wf_core::{Error, Preset, PresetRecord, Result, SourceKind};
use wf_rules::{date_stamp, NamingTable, DEFAULT_CLIENT_LABEL};

pub const SUPERLED_WIDTH: u32 = 3648;
pub const SUPERLED_HEIGHT: u32 = 1152;
pub const SUPERLED_SECS: f64 = 30.0;
pub const MAX_PANEL_CLIPS: usize = 3;

const SCRATCH_PREFIX: &str = ".wallforge-superled";

/// Geometry of one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSpec {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const LEFT_PANEL: PanelSpec = PanelSpec {
    name: "left",
    width: 768,
    height: 1152,
};
pub const CENTER_PANEL: PanelSpec = PanelSpec {
    name: "center",
    width: 2112,
    height: 1152,
};
pub const RIGHT_PANEL: PanelSpec = PanelSpec {
    name: "right",
    width: 768,
    height: 1152,
};

/// The clips of each panel, in play order.
#[derive(Debug, Clone)]
pub struct SuperLedRequest {
    pub left: Vec<PathBuf>,
    pub center: Vec<PathBuf>,
    pub right: Vec<PathBuf>,
    pub client_label: String,
    pub date: NaiveDate,
}

impl SuperLedRequest {
    pub fn new(left: Vec<PathBuf>, center: Vec<PathBuf>, right: Vec<PathBuf>) -> Self {
        Self {
            left,
            center,
            right,
            client_label: DEFAULT_CLIENT_LABEL.to_string(),
            date: Local::now().date_naive(),
        }
    }

    pub fn with_client_label(mut self, label: impl Into<String>) -> Self {
        self.client_label = label.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Each panel needs between one and [`MAX_PANEL_CLIPS`] clips.
    pub fn validate(&self) -> Result<()> {
        for (panel, clips) in self.panels() {
            if clips.is_empty() || clips.len() > MAX_PANEL_CLIPS {
                return Err(Error::Validation(format!(
                    "{} panel needs 1 to {MAX_PANEL_CLIPS} clips, got {}",
                    panel.name,
                    clips.len()
                )));
            }
        }
        Ok(())
    }

    fn panels(&self) -> [(PanelSpec, &[PathBuf]); 3] {
        [
            (LEFT_PANEL, self.left.as_slice()),
            (CENTER_PANEL, self.center.as_slice()),
            (RIGHT_PANEL, self.right.as_slice()),
        ]
    }
}

/// The preset the finished wall video is named after.
pub fn superled_preset() -> Result<Preset> {
    PresetRecord {
        id: "SUPERLED".into(),
        name: "SuperLED".into(),
        width: SUPERLED_WIDTH,
        height: SUPERLED_HEIGHT,
        duration: SUPERLED_SECS,
        apply_bar: false,
        bar_size: None,
        letterbox: false,
        ratio_tolerance: None,
        use_original_duration: false,
    }
    .normalize()
}

/// Builds SuperLED composites through a [`RenderInvoker`].
pub struct SuperLedComposer {
    invoker: Arc<dyn RenderInvoker>,
    events: Arc<EventBus>,
    encoder: EncoderSettings,
    naming: Arc<NamingTable>,
    locks: DirectoryLocks,
}

impl SuperLedComposer {
    pub fn new(invoker: Arc<dyn RenderInvoker>, events: Arc<EventBus>, encoder: EncoderSettings) -> Self {
        Self {
            invoker,
            events,
            encoder,
            naming: Arc::new(NamingTable::default()),
            locks: DirectoryLocks::new(),
        }
    }

    pub fn with_naming(mut self, naming: Arc<NamingTable>) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_locks(mut self, locks: DirectoryLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Build the composite and return its final path, next to the first
    /// left clip.
    pub async fn compose(&self, request: &SuperLedRequest) -> Result<PathBuf> {
        let result = self.try_compose(request).await;
        match &result {
            Ok(output) => {
                tracing::info!(output = %output.display(), "SuperLED composite ready");
                self.events.broadcast(EventPayload::CompositeCompleted {
                    output: output.clone(),
                });
            }
            Err(e) => {
                tracing::error!("SuperLED composite failed: {e}");
                self.events.broadcast(EventPayload::CompositeFailed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn try_compose(&self, request: &SuperLedRequest) -> Result<PathBuf> {
        request.validate()?;
        let preset = superled_preset()?;

        let work_dir = request
            .left
            .first()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let scratch = scratch_dir_in(&work_dir, SCRATCH_PREFIX)?;
        let result = self
            .render_in(request, &preset, &work_dir, scratch.path())
            .await;
        close_scratch(scratch);
        result
    }

    async fn render_in(
        &self,
        request: &SuperLedRequest,
        preset: &Preset,
        work_dir: &Path,
        scratch: &Path,
    ) -> Result<PathBuf> {
        let (left, center, right) = tokio::try_join!(
            self.build_panel(LEFT_PANEL, &request.left, scratch),
            self.build_panel(CENTER_PANEL, &request.center, scratch),
            self.build_panel(RIGHT_PANEL, &request.right, scratch),
        )?;

        let stacked = scratch.join("superled.mp4");
        let stack = RenderRequest::graph(
            "stack",
            vec![left, center, right],
            &stacked,
            hstack_graph(),
            SUPERLED_SECS,
            self.encoder.clone(),
        );
        self.render_step(&stack).await?;

        let base = self
            .naming
            .base_name(preset, &request.client_label, &date_stamp(request.date));
        self.locks
            .move_unique(&stacked, work_dir, &base, "mp4")
            .await
    }

    /// Scale every clip of a panel, then join them into one 30s panel clip.
    async fn build_panel(&self, panel: PanelSpec, clips: &[PathBuf], scratch: &Path) -> Result<PathBuf> {
        let mut scaled = Vec::with_capacity(clips.len());
        let mut durations = Vec::with_capacity(clips.len());

        for (idx, clip) in clips.iter().enumerate() {
            let info = self.invoker.probe(clip).await.ok_or_else(|| {
                Error::Probe(format!("{} panel: cannot read {}", panel.name, clip.display()))
            })?;

            let out = scratch.join(format!("{}_{idx}.mp4", panel.name));
            let mut scale = RenderRequest::chain(
                format!("{} scale {}/{}", panel.name, idx + 1, clips.len()),
                clip,
                &out,
                panel_scale_filter(panel.width, panel.height),
                info.duration_secs,
                self.encoder.clone(),
            );
            if SourceKind::from_path(clip) == SourceKind::Image {
                scale = scale.looped();
            }
            self.render_step(&scale).await?;

            scaled.push(out);
            durations.push(info.duration_secs);
        }

        let graph = panel_assemble_graph(&durations, SUPERLED_SECS).ok_or_else(|| {
            Error::Validation(format!("{} panel: unsupported clip count {}", panel.name, clips.len()))
        })?;
        let out = scratch.join(format!("{}.mp4", panel.name));
        let assemble = RenderRequest::graph(
            format!("{} assemble", panel.name),
            scaled,
            &out,
            graph,
            SUPERLED_SECS,
            self.encoder.clone(),
        );
        self.render_step(&assemble).await?;

        tracing::debug!(panel = panel.name, output = %out.display(), "Panel ready");
        Ok(out)
    }

    async fn render_step(&self, request: &RenderRequest) -> Result<()> {
        let step = request.label.clone();
        let on_progress = |percent: u8| {
            self.events.broadcast(EventPayload::CompositeProgress {
                step: step.clone(),
                percent,
            });
        };
        self.invoker.render(request, &on_progress, None).await
    }
}

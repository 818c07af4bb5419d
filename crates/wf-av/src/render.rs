//! Render requests and ffmpeg progress parsing.

use std::path::PathBuf;

use wf_core::config::EncoderSettings;

/// How the request's filter is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A simple `-vf` chain on the single input.
    Chain(String),
    /// A `-filter_complex` graph whose output pad is `label`.
    Graph { graph: String, label: String },
}

/// One subprocess invocation: inputs, a filter, a duration, an output.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub filter: Filter,
    /// Output length and the denominator of progress percentages.
    pub duration_secs: f64,
    pub encoder: EncoderSettings,
    /// Loop the (single, still) input so it lasts `duration_secs`.
    pub loop_input: bool,
    /// Label used in logs and error messages (preset id or step name).
    pub label: String,
}

impl RenderRequest {
    /// A single-input render with a `-vf` chain.
    pub fn chain(
        label: impl Into<String>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        filter: impl Into<String>,
        duration_secs: f64,
        encoder: EncoderSettings,
    ) -> Self {
        Self {
            inputs: vec![input.into()],
            output: output.into(),
            filter: Filter::Chain(filter.into()),
            duration_secs,
            encoder,
            loop_input: false,
            label: label.into(),
        }
    }

    /// A multi-input render through a filter graph whose output is `[v]`.
    pub fn graph(
        label: impl Into<String>,
        inputs: Vec<PathBuf>,
        output: impl Into<PathBuf>,
        graph: impl Into<String>,
        duration_secs: f64,
        encoder: EncoderSettings,
    ) -> Self {
        Self {
            inputs,
            output: output.into(),
            filter: Filter::Graph {
                graph: graph.into(),
                label: "v".into(),
            },
            duration_secs,
            encoder,
            loop_input: false,
            label: label.into(),
        }
    }

    /// Loop the still input.
    pub fn looped(mut self) -> Self {
        self.loop_input = true;
        self
    }

    /// ffmpeg arguments for this request, with machine-readable progress on
    /// stderr.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-progress", "pipe:2", "-nostats"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        for input in &self.inputs {
            if self.loop_input {
                args.extend(["-loop".into(), "1".into()]);
            }
            args.push("-i".into());
            args.push(input.to_string_lossy().to_string());
        }

        match &self.filter {
            Filter::Chain(chain) => {
                args.push("-vf".into());
                args.push(chain.clone());
            }
            Filter::Graph { graph, label } => {
                args.push("-filter_complex".into());
                args.push(graph.clone());
                args.push("-map".into());
                args.push(format!("[{label}]"));
            }
        }

        args.push("-t".into());
        args.push(format_secs(self.duration_secs));
        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.encoder.preset_name.clone(),
            "-crf".into(),
            self.encoder.quality_factor.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-an".into(),
        ]);
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

fn format_secs(secs: f64) -> String {
    let s = format!("{secs:.3}");
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Turns ffmpeg `-progress` key=value lines into monotonic 0..=100 percents.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    duration_secs: f64,
    last: Option<u8>,
}

impl ProgressTracker {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            last: None,
        }
    }

    /// Feed one stderr line; returns a percent only when it advances.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        let value = line.trim().strip_prefix("out_time_us=")?;
        let micros = value.trim().parse::<i64>().ok()?;
        if self.duration_secs <= 0.0 {
            return None;
        }
        let elapsed = micros.max(0) as f64 / 1_000_000.0;
        let pct = ((elapsed / self.duration_secs) * 100.0).floor().clamp(0.0, 100.0) as u8;
        self.advance(pct)
    }

    /// Report completion; returns 100 unless it was already reported.
    pub fn finish(&mut self) -> Option<u8> {
        self.advance(100)
    }

    /// Highest percent reported so far.
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    fn advance(&mut self, pct: u8) -> Option<u8> {
        match self.last {
            Some(prev) if pct <= prev => None,
            _ => {
                self.last = Some(pct);
                Some(pct)
            }
        }
    }
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wallforge")]
#[command(author, version, about = "Batch transcoder for digital-signage formats")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the presets file (overrides `presets_path` in the config)
    #[arg(long, global = true)]
    pub presets: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode files (or every media file in the given directories) into
    /// every compatible preset
    Run(RunArgs),

    /// Probe a media file and display its size and duration
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List presets with the tag their outputs are named after
    Presets {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a SuperLED wall composite from three panels of clips
    Superled(SuperledArgs),

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Args)]
pub struct RunArgs {
    /// Source files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Client label used in output names
    #[arg(long)]
    pub client: Option<String>,

    /// Only render these preset IDs, in this order (repeatable)
    #[arg(long = "preset", value_name = "ID")]
    pub preset_ids: Vec<String>,

    /// Number of sources processed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// x264 CRF value (0-51)
    #[arg(long)]
    pub quality: Option<u32>,

    /// x264 preset name (ultrafast ... veryslow)
    #[arg(long)]
    pub encoder_preset: Option<String>,
}

#[derive(Args)]
pub struct SuperledArgs {
    /// Clips of the left panel (1-3)
    #[arg(long, required = true, num_args = 1..=3)]
    pub left: Vec<PathBuf>,

    /// Clips of the center panel (1-3)
    #[arg(long, required = true, num_args = 1..=3)]
    pub center: Vec<PathBuf>,

    /// Clips of the right panel (1-3)
    #[arg(long, required = true, num_args = 1..=3)]
    pub right: Vec<PathBuf>,

    /// Client label used in the output name
    #[arg(long)]
    pub client: Option<String>,
}

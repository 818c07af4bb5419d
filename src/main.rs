mod cli;

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, RunArgs, SuperledArgs};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use wf_av::{FfmpegInvoker, FfprobeProber, ToolRegistry};
use wf_core::config::Config;
use wf_core::events::{Event, EventBus, EventPayload};
use wf_core::preset::{default_records, normalize_all, PresetStore};
use wf_core::{Preset, PresetRecord, SourceId};
use wf_queue::{discover_sources, Batch, QueueEngine, SuperLedRequest};
use wf_rules::NamingTable;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    // Logs go to stderr so that --json output stays clean.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "wallforge=trace,wf_core=debug,wf_av=debug,wf_rules=debug,wf_queue=debug".to_string()
        } else {
            "wallforge=info,wf_core=info,wf_av=info,wf_rules=info,wf_queue=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<wf_core::Error>()
                .map(wf_core::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = Config::load_or_default(cli.config.as_deref());
    let presets_path = cli.presets.or_else(|| config.presets_path.clone());

    match cli.command {
        Commands::Run(args) => block_on(run_batch(args, config, presets_path)),
        Commands::Probe { file, json } => block_on(probe_file(&file, &config, json)),
        Commands::Presets { json } => list_presets(presets_path.as_deref(), json),
        Commands::Superled(args) => block_on(run_superled(args, config)),
        Commands::CheckTools => block_on(check_tools(&config)),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("wallforge {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run `fut` on a fresh runtime. The runtime is shut down without waiting
/// for the blocking stdin reader.
fn block_on<F: std::future::Future<Output = Result<ExitCode>>>(fut: F) -> Result<ExitCode> {
    let rt = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let result = rt.block_on(fut);
    rt.shutdown_background();
    result
}

fn load_presets(path: Option<&Path>) -> Result<Vec<PresetRecord>> {
    match path {
        Some(path) => PresetStore::load_or_init(path)
            .with_context(|| format!("loading presets from {}", path.display())),
        None => Ok(default_records()),
    }
}

/// All presets, or the requested IDs in the requested order.
fn select_presets(records: &[PresetRecord], ids: &[String]) -> Result<Vec<Preset>> {
    let presets = normalize_all(records)?;
    if ids.is_empty() {
        return Ok(presets);
    }
    ids.iter()
        .map(|id| {
            presets
                .iter()
                .find(|p| p.id.eq_ignore_ascii_case(id))
                .cloned()
                .ok_or_else(|| anyhow::Error::from(wf_core::Error::not_found("preset", id)))
        })
        .collect()
}

fn discover_tools(config: &Config) -> Result<Arc<ToolRegistry>> {
    let tools = ToolRegistry::discover(&config.tools);
    tools.ffmpeg()?;
    tools.ffprobe()?;
    Ok(Arc::new(tools))
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn run_batch(args: RunArgs, mut config: Config, presets_path: Option<std::path::PathBuf>) -> Result<ExitCode> {
    if let Some(n) = args.concurrency {
        config.queue.concurrency = n;
    }
    if let Some(q) = args.quality {
        config.encoder.quality_factor = q;
    }
    if let Some(name) = args.encoder_preset {
        config.encoder.preset_name = name;
    }
    for warning in config.validate() {
        tracing::warn!("{warning}");
    }

    let records = load_presets(presets_path.as_deref())?;
    let presets = select_presets(&records, &args.preset_ids)?;

    let sources = discover_sources(&args.paths);
    if sources.is_empty() {
        anyhow::bail!("No supported media files found in the given paths");
    }

    let tools = discover_tools(&config)?;
    let events = Arc::new(EventBus::default());
    let engine = Arc::new(QueueEngine::new(
        Arc::new(FfmpegInvoker::new(tools)),
        config.queue.clone(),
        Arc::clone(&events),
    ));

    let printed = CancellationToken::new();
    let printer = tokio::spawn(print_events(events.subscribe(), printed.clone()));
    let stdin_control = tokio::spawn(read_control_commands(Arc::clone(&engine)));
    let ctrl_c = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling batch");
                engine.cancel();
            }
        })
    };

    println!(
        "Processing {} source(s) with {} preset(s), {} at a time (type pause, resume or cancel)",
        sources.len(),
        presets.len(),
        config.queue.effective_concurrency()
    );

    let client = args
        .client
        .unwrap_or_else(|| config.default_client_label.clone());
    let batch = Batch::new(sources, presets)
        .with_client_label(client)
        .with_encoder(config.encoder.clone());
    let report = engine.run_batch(batch).await;

    stdin_control.abort();
    ctrl_c.abort();
    printed.cancel();
    let _ = printer.await;

    let report = report?;

    println!("\n--- log ---");
    print!("{}", report.log);
    println!("--- summary ---");
    println!(
        "Completed: {}  Failed: {}  Cancelled: {}",
        report.completed, report.failed, report.cancelled
    );
    for output in &report.outputs {
        println!("  {}", output.display());
    }

    match report.aborted {
        Some(error) => {
            eprintln!("Batch aborted: {error}");
            Ok(ExitCode::from(5))
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

async fn read_control_commands(engine: Arc<QueueEngine>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "pause" | "p" => {
                engine.pause();
            }
            "resume" | "r" => {
                engine.resume();
            }
            "cancel" | "c" => {
                engine.cancel();
            }
            "" => {}
            other => eprintln!("Unknown command {other:?} (expected pause, resume or cancel)"),
        }
    }
}

/// Print events until `done` fires and nothing is left queued.
async fn print_events(mut rx: broadcast::Receiver<Event>, done: CancellationToken) {
    let mut names: HashMap<SourceId, String> = HashMap::new();
    let name_of = |names: &HashMap<SourceId, String>, id: &SourceId| {
        names.get(id).cloned().unwrap_or_else(|| id.to_string())
    };

    loop {
        let received = tokio::select! {
            biased;
            received = rx.recv() => received,
            _ = done.cancelled() => break,
        };
        let event = match received {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("Event printer skipped {n} event(s)");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event.payload {
            EventPayload::SourceStarted { source_id, path } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                println!("> {name}");
                names.insert(source_id, name);
            }
            EventPayload::SourceProgress {
                source_id,
                preset_id,
                percent,
            } if percent % 25 == 0 => {
                println!("  {} [{preset_id}] {percent}%", name_of(&names, &source_id));
            }
            EventPayload::SourceCompleted {
                source_id,
                outputs,
                warning,
            } => {
                println!("✓ {} ({} output(s))", name_of(&names, &source_id), outputs.len());
                if let Some(warning) = warning {
                    println!("  warning: {warning}");
                }
            }
            EventPayload::SourceFailed { source_id, error } => {
                println!("✗ {}: {error}", name_of(&names, &source_id));
            }
            EventPayload::SourceProbeFailed { path, .. } => {
                println!("✗ {}: not a readable media file", path.display());
            }
            EventPayload::SourceCancelled { source_id } => {
                println!("- {} cancelled", name_of(&names, &source_id));
            }
            EventPayload::QueuePaused => println!("|| paused"),
            EventPayload::QueueResumed => println!("|> resumed"),
            EventPayload::QueueCancelled => println!("cancelling..."),
            EventPayload::CompositeProgress { step, percent } if percent % 25 == 0 => {
                println!("  [{step}] {percent}%");
            }
            EventPayload::CompositeFailed { error } => println!("✗ composite: {error}"),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// superled
// ---------------------------------------------------------------------------

async fn run_superled(args: SuperledArgs, config: Config) -> Result<ExitCode> {
    let tools = discover_tools(&config)?;
    let events = Arc::new(EventBus::default());
    let engine = QueueEngine::new(
        Arc::new(FfmpegInvoker::new(tools)),
        config.queue.clone(),
        Arc::clone(&events),
    );
    let printed = CancellationToken::new();
    let printer = tokio::spawn(print_events(events.subscribe(), printed.clone()));

    let client = args
        .client
        .unwrap_or_else(|| config.default_client_label.clone());
    let request = SuperLedRequest::new(args.left, args.center, args.right).with_client_label(client);
    let result = engine.superled(config.encoder.clone()).compose(&request).await;

    printed.cancel();
    let _ = printer.await;

    let output = result?;
    println!("SuperLED composite: {}", output.display());
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// probe / presets / tools / validate
// ---------------------------------------------------------------------------

async fn probe_file(file: &Path, config: &Config, json: bool) -> Result<ExitCode> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(tools.ffprobe()?.to_path_buf());

    match prober.try_probe(file).await {
        Ok(info) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("File: {}", file.display());
                println!("Resolution: {}x{}", info.width, info.height);
                println!("Duration: {:.2}s", info.duration_secs);
                if let Some(ratio) = info.aspect_ratio() {
                    println!("Aspect ratio: {ratio:.3}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}: not a media file", file.display());
            tracing::debug!("Probe error: {e}");
            Ok(ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1)))
        }
    }
}

#[derive(Serialize)]
struct PresetView {
    #[serde(flatten)]
    record: PresetRecord,
    tag: String,
}

fn list_presets(path: Option<&Path>, json: bool) -> Result<ExitCode> {
    let records = load_presets(path)?;
    let presets = normalize_all(&records)?;
    let naming = NamingTable::default();

    if json {
        let views: Vec<PresetView> = presets
            .iter()
            .map(|p| PresetView {
                record: p.to_record(),
                tag: naming.tag(p),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<10} {:<12} {:>11} {:>7}  {:<14} TAG", "ID", "NAME", "SIZE", "SECS", "PADDING");
    for preset in &presets {
        let padding = match preset.padding {
            wf_core::Padding::Stretch => "stretch".to_string(),
            wf_core::Padding::Letterbox => "letterbox".to_string(),
            wf_core::Padding::Bar { size } => format!("bar {size}px"),
        };
        let secs = if preset.use_original_duration {
            "orig".to_string()
        } else {
            format!("{:.1}", preset.duration_secs)
        };
        println!(
            "{:<10} {:<12} {:>11} {:>7}  {:<14} {}",
            preset.id,
            preset.name,
            format!("{}x{}", preset.width, preset.height),
            secs,
            padding,
            naming.tag(preset)
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn check_tools(config: &Config) -> Result<ExitCode> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools);
    let infos = tools.check_all().await;
    let mut all_ok = true;

    for tool in &infos {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Some tools are missing. Install ffmpeg to transcode.");
        Ok(ExitCode::from(4))
    }
}

fn validate_config(path: Option<&Path>) -> Result<ExitCode> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Concurrency: {}", config.queue.concurrency);
    println!("  Archive directory: {}", config.queue.archive_dir_name);
    println!(
        "  Encoder: preset {} / crf {}",
        config.encoder.preset_name, config.encoder.quality_factor
    );
    match &config.presets_path {
        Some(p) => println!("  Presets: {}", p.display()),
        None => println!("  Presets: built-in"),
    }

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ⚠ {warning}");
    }
    Ok(ExitCode::SUCCESS)
}

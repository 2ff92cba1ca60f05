//! Radar composite batch processor.
//!
//! Reads composites over a time range, optionally filters, accumulates and
//! resamples them onto a destination grid, writes one output per time and
//! optionally interpolates the outputs in time.

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use obs_process::{ObsProcessConfig, ObsProcessor};
use radar_common::parse_time;

#[derive(Parser, Debug)]
#[command(name = "obs-process")]
#[command(about = "Batch processing of radar composites")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "OBS_CONFIG", default_value = "/etc/obs-process/config.yaml")]
    config: String,

    /// First input time (overrides the config file)
    #[arg(long)]
    start: Option<String>,

    /// Last input time (overrides the config file)
    #[arg(long)]
    end: Option<String>,

    /// Worker threads
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Skip times whose output already exists
    #[arg(long)]
    complete_dataset: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);
    if args.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    info!("Starting radar composite processing");

    // Load configuration
    let mut config = ObsProcessConfig::from_yaml(&args.config)?;
    config.apply_env()?;
    if let Some(start) = &args.start {
        config.start = parse_time(start)?;
    }
    if let Some(end) = &args.end {
        config.end = parse_time(end)?;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    config.complete_dataset |= args.complete_dataset;

    if let Some(workers) = config.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .context("Failed to configure worker threads")?;
    }
    info!(
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        workers = rayon::current_num_threads(),
        "Loaded configuration"
    );

    let processor = ObsProcessor::new(config)?;
    let summary = processor.run()?;

    info!(
        total = summary.total,
        written = summary.written,
        no_data = summary.no_data,
        skipped = summary.skipped,
        failed = summary.failed,
        duration_ms = summary.duration_ms,
        "Batch complete"
    );

    if summary.failed > 0 {
        bail!("{} of {} tasks failed", summary.failed, summary.total);
    }
    Ok(())
}

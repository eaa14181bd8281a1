//! sidcap - SID register-write capture
//!
//! Reads the register-write dump an emulator writes to a fifo (or a file),
//! compacts it and writes one compressed output file.
//!
//! Usage:
//!   sidcap --input /tmp/dump.fifo --output tune.dump.zst -- emulator --dump /tmp/dump.fifo tune.sid
//!   sidcap --input recorded.txt --format parquet

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sidcap_rs::{
    config::{default_config_path, CaptureConfig},
    session::{summary_path, CaptureSession, SessionSummary},
    sink::open_sink,
    source::{Detached, FileSource, ProducerLiveness},
    ClockMode, OutputFormat, RecordLayout,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "sidcap", version)]
#[command(about = "Capture and compact a SID register-write dump")]
struct Args {
    /// Input fifo or dump file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (defaults to the input path with the format's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format: text or parquet
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Input record layout: full or legacy
    #[arg(long)]
    layout: Option<RecordLayout>,

    /// Event timing: absolute or delta
    #[arg(long)]
    clock_mode: Option<ClockMode>,

    /// Highest register index to keep
    #[arg(long, conflicts_with = "no_register_limit")]
    max_register: Option<u8>,

    /// Keep writes to every register
    #[arg(long)]
    no_register_limit: bool,

    /// Idle time after producer exit before the capture ends
    #[arg(long)]
    quiescence_ms: Option<u64>,

    /// Write a JSON summary next to the output
    #[arg(long)]
    summary: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Producer command to launch once the input is open
    #[arg(last = true)]
    producer: Vec<String>,
}

impl Args {
    /// Apply command-line overrides on top of the loaded config
    fn apply(&self, config: &mut CaptureConfig) {
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(layout) = self.layout {
            config.compaction.layout = layout;
        }
        if let Some(clock_mode) = self.clock_mode {
            config.compaction.clock_mode = clock_mode;
        }
        if let Some(max) = self.max_register {
            config.compaction.max_register = Some(max);
        }
        if self.no_register_limit {
            config.compaction.max_register = None;
        }
        if let Some(ms) = self.quiescence_ms {
            config.input.quiescence_ms = ms;
        }
        if self.summary {
            config.output.write_summary = true;
        }
    }

    fn output_path(&self, format: OutputFormat) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension(format.extension()))
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sidcap_rs=debug"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<CaptureConfig> {
    let mut config = match &args.config {
        // An explicit config file must load
        Some(path) => CaptureConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => {
            if let Some(path) = default_config_path() {
                tracing::debug!("Looking for config at {:?}", path);
            }
            CaptureConfig::load_or_default(None)
        }
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn spawn_producer(command: &[String]) -> anyhow::Result<Box<dyn ProducerLiveness>> {
    let Some((program, args)) = command.split_first() else {
        return Ok(Box::new(Detached));
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch producer {:?}", program))?;
    tracing::info!("Launched producer {:?} (pid {})", program, child.id());
    Ok(Box::new(child))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive so buffered log lines reach the file
    let _log_guard = init_logging(args.log_file.as_deref())?;

    tracing::info!("Starting sidcap {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let output = args.output_path(config.output.format);

    // Open the read side first so a producer opening the fifo never waits
    let source = FileSource::open(&args.input)?;
    let sink = open_sink(&config.output, &output, config.compaction.clock_mode)?;
    let liveness = spawn_producer(&args.producer)?;

    let report = CaptureSession::new(&config, Box::new(source), sink, liveness)
        .run()
        .with_context(|| format!("Capture from {:?} failed", args.input))?;

    tracing::info!(
        "Wrote {} events ({} bytes) to {:?}, kept {:.1}% of records",
        report.sink.events_written,
        report.sink.bytes_written,
        output,
        report.retention() * 100.0
    );

    if config.output.write_summary {
        let summary = SessionSummary::from_report(
            &report,
            Some(&args.input),
            config.compaction.layout,
            config.compaction.clock_mode,
        );
        summary.save(summary_path(&output))?;
    }

    Ok(())
}

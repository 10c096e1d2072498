//! sluice-copy — copy a file through a bounded channel.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use sluice::{pipe, BoundedChannel, ChannelConfig, FileSink};
use sluice_core::{Measure, SluiceConfig};

// ── Arguments ─────────────────────────────────────────────────────────────────

struct Args {
    source: PathBuf,
    dest: PathBuf,
    capacity: Option<usize>,
    chunk_size: Option<usize>,
    chunks: bool,
    json: bool,
}

enum Command {
    Copy(Args),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut capacity = None;
    let mut chunk_size = None;
    let mut chunks = false;
    let mut json = false;
    let mut positional: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--capacity" => {
                i += 1;
                capacity = Some(
                    args.get(i)
                        .context("--capacity requires a value")?
                        .parse()
                        .context("--capacity must be a number")?,
                );
            }
            "--chunk-size" => {
                i += 1;
                chunk_size = Some(
                    args.get(i)
                        .context("--chunk-size requires a value")?
                        .parse()
                        .context("--chunk-size must be a number")?,
                );
            }
            "--chunks" => chunks = true,
            "--json" => json = true,
            "help" | "--help" | "-h" => return Ok(Command::Help),
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            other => positional.push(other),
        }
        i += 1;
    }

    if chunk_size == Some(0) {
        bail!("--chunk-size must be at least 1");
    }
    if capacity == Some(0) {
        bail!("--capacity must be at least 1");
    }

    match positional.as_slice() {
        [source, dest] => Ok(Command::Copy(Args {
            source: PathBuf::from(source),
            dest: PathBuf::from(dest),
            capacity,
            chunk_size,
            chunks,
            json,
        })),
        _ => bail!("expected <src> <dst>"),
    }
}

fn print_usage() {
    println!("Usage: sluice-copy [options] <src> <dst>");
    println!();
    println!("Copies <src> to <dst>, pausing reads whenever the write buffer is full.");
    println!();
    println!("Options:");
    println!("  --capacity <n>     Buffer high-water mark (default: from config)");
    println!("  --chunk-size <n>   Bytes read per chunk (default: from config)");
    println!("  --chunks           Count capacity in chunks instead of bytes");
    println!("  --json             Print the report as JSON");
    println!();
    println!("Config: {}", SluiceConfig::file_path().display());
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CopyReport {
    source: String,
    dest: String,
    chunks: u64,
    bytes: u64,
    blake3: String,
    drain_waits: u64,
    capacity: usize,
    measure: String,
    elapsed_ms: u128,
}

fn print_report(report: &CopyReport) {
    println!("═══════════════════════════════════════");
    println!("  Copy complete");
    println!("═══════════════════════════════════════");
    println!("  Source      : {}", report.source);
    println!("  Destination : {}", report.dest);
    println!("  Chunks      : {}", report.chunks);
    println!(
        "  Bytes       : {} ({:.1} KB)",
        report.bytes,
        report.bytes as f64 / 1024.0
    );
    println!("  BLAKE3      : {}", report.blake3);
    println!("  Capacity    : {} {}", report.capacity, report.measure);
    println!("  Drain waits : {}", report.drain_waits);
    println!("  Elapsed     : {} ms", report.elapsed_ms);
}

// ── Copy ──────────────────────────────────────────────────────────────────────

async fn run_copy(args: Args, config: SluiceConfig) -> Result<()> {
    let mut channel_config = ChannelConfig::from(&config.channel);
    if let Some(capacity) = args.capacity {
        channel_config.capacity = capacity;
    }
    if args.chunks {
        channel_config.measure = Measure::Chunks;
    }
    let chunk_size = args.chunk_size.unwrap_or(config.copy.chunk_size);

    let source = tokio::fs::File::open(&args.source)
        .await
        .with_context(|| format!("failed to open source: {}", args.source.display()))?;
    let sink = FileSink::create(&args.dest)
        .await
        .with_context(|| format!("failed to create destination: {}", args.dest.display()))?;

    tracing::info!(
        source = %args.source.display(),
        dest = %args.dest.display(),
        capacity = channel_config.capacity,
        measure = %channel_config.measure,
        chunk_size,
        "copy starting"
    );

    let started = Instant::now();
    let channel = BoundedChannel::new(sink, channel_config).context("invalid channel settings")?;
    let summary = pipe(source, &channel, chunk_size)
        .await
        .context("copy failed")?;

    let report = CopyReport {
        source: args.source.display().to_string(),
        dest: args.dest.display().to_string(),
        chunks: summary.chunks,
        bytes: summary.bytes,
        blake3: hex::encode(summary.digest),
        drain_waits: summary.drain_waits,
        capacity: channel_config.capacity,
        measure: channel_config.measure.to_string(),
        elapsed_ms: started.elapsed().as_millis(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = SluiceConfig::write_default_if_missing() {
        eprintln!("warning: failed to write default config: {e}");
    }
    let config = SluiceConfig::load().unwrap_or_else(|e| {
        eprintln!("warning: failed to load config, using defaults: {e}");
        SluiceConfig::default()
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args) {
        Ok(Command::Copy(args)) => run_copy(args, config).await,
        Ok(Command::Help) => {
            print_usage();
            Ok(())
        }
        Err(e) => {
            eprintln!("{e:#}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    }
}

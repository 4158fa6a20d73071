//! opcal CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use opcal_core::{CalibrationConfig, CalibrationDriver, Event, EventOutcome};

#[derive(Parser)]
#[command(name = "opcal")]
#[command(about = "opcal - b-tagging operating points from efficiency curves")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accumulate discriminators over events and resolve operating points
    Run {
        /// Calibration configuration (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Events, one JSON object per line
        #[arg(short, long)]
        events: PathBuf,

        /// Output file for the report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto). 1 streams events without loading them all.
        #[arg(long, default_value = "1")]
        threads: usize,
    },

    /// Validate a configuration and print the resolved working points
    Validate {
        /// Calibration configuration (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { config, events, output, threads } => {
            cmd_run(&config, &events, output.as_ref(), threads)
        }
        Commands::Validate { config } => cmd_validate(&config),
    }
}

fn load_config(path: &Path) -> Result<CalibrationConfig> {
    let cfg = CalibrationConfig::load(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    tracing::info!(taggers = cfg.operating_points.len(), "configuration loaded");
    Ok(cfg)
}

fn cmd_run(config: &Path, events: &Path, output: Option<&PathBuf>, threads: usize) -> Result<()> {
    let cfg = load_config(config)?;
    let mut driver = CalibrationDriver::from_config(&cfg)?;

    let file = std::fs::File::open(events)
        .with_context(|| format!("cannot open events {}", events.display()))?;
    let reader = BufReader::new(file);

    if threads == 1 {
        let mut skipped = 0usize;
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = parse_event(&line, lineno)?;
            if let EventOutcome::Skipped { .. } = driver.process_event(&event)? {
                skipped += 1;
            }
        }
        tracing::info!(skipped, "event loop finished");
    } else {
        let mut all = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if !line.trim().is_empty() {
                all.push(parse_event(&line, lineno)?);
            }
        }
        tracing::info!(events = all.len(), threads, "processing events in parallel");
        driver.process_parallel(&all, threads)?;
    }

    let report = driver.finalize();
    tracing::info!(
        processed = report.stats.events_processed,
        failed = report.stats.events_failed,
        "calibration finished"
    );
    write_json(output, serde_json::to_value(&report)?)
}

fn parse_event(line: &str, lineno: usize) -> Result<Event> {
    serde_json::from_str(line).with_context(|| format!("malformed event on line {}", lineno + 1))
}

fn cmd_validate(config: &Path) -> Result<()> {
    let cfg = load_config(config)?;
    let working_points = cfg.working_points()?;
    let output = serde_json::json!({
        "mode": cfg.mode(),
        "inversion_policy": cfg.inversion_policy,
        "matching_tolerance": cfg.matching_tolerance,
        "working_points": working_points,
    });
    write_json(None, output)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

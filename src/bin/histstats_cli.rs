// src/bin/histstats_cli.rs
use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use hist_stats::enrich::{EnrichError, FilterConfig, FilterOutcome, HistogramFilter};
use hist_stats::histogram::{parse_quantiles_str, HistogramBuilder, QuantileList};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use jemallocator::Jemalloc;

#[global_allocator]
#[cfg(target_os = "linux")]
static ALLOC: Jemalloc = Jemalloc;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Log level when RUST_LOG is unset (error|warn|info|debug|trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Read from this file instead of stdin
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Percentiles to compute, e.g. "25,50,75,95" (ascending, 0-100)
    #[arg(short, long, global = true)]
    quantiles: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Summarize one JSON histogram object ({"label": count, ...}) and print the statistics
    Stats,
    /// Enrich NDJSON records: read the histogram at --source, write statistics under --target
    Filter {
        /// Field reference of the histogram, e.g. "[result][histogram-latency]"
        #[arg(long)]
        source: Option<String>,
        /// Field reference receiving the statistics
        #[arg(long)]
        target: Option<String>,
        /// JSON filter config ({"source", "target", "quantiles"}); flags override it
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},hist_stats={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&Path>) -> Result<Box<dyn BufRead>, Box<dyn Error>> {
    Ok(match path {
        Some(p) => Box::new(BufReader::new(fs::File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

fn parse_quantiles_arg(raw: Option<&str>) -> Result<Option<QuantileList>, EnrichError> {
    raw.map(parse_quantiles_str)
        .transpose()
        .map_err(EnrichError::from)
}

fn to_json(v: &Value, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(v)
    } else {
        serde_json::to_string(v)
    }
}

fn run_stats(args: &Args, quantiles: Option<QuantileList>) -> Result<(), Box<dyn Error>> {
    let mut s = String::new();
    read_input(args.input.as_deref())?.read_to_string(&mut s)?;
    let raw: Value = serde_json::from_str(&s)?;

    let mut builder = HistogramBuilder::new();
    if let Some(q) = quantiles {
        builder = builder.quantiles(q);
    }
    let record = match builder.build_from_json(&raw) {
        Ok(h) => h.compute(),
        Err(err) => {
            tracing::debug!(error = %err, "input is not a histogram");
            Default::default()
        }
    };
    println!("{}", to_json(&Value::Object(record), args.pretty)?);
    Ok(())
}

fn run_filter(
    args: &Args,
    quantiles: Option<QuantileList>,
    source: Option<String>,
    target: Option<String>,
    config: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let mut cfg: FilterConfig = match config {
        Some(p) => FilterConfig::from_json_str(&fs::read_to_string(p)?)?,
        None => FilterConfig::default(),
    };
    if source.is_some() {
        cfg.source = source;
    }
    if target.is_some() {
        cfg.target = target;
    }
    if quantiles.is_some() {
        cfg.quantiles = quantiles;
    }
    let filter = HistogramFilter::from_config(cfg)?;

    let mut records = Vec::new();
    for (lineno, line) in read_input(args.input.as_deref())?.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: Value = serde_json::from_str(&line)
            .map_err(|e| format!("line {}: invalid JSON record: {e}", lineno + 1))?;
        records.push(rec);
    }

    let outcomes = filter.filter_many(&mut records);
    let enriched = outcomes
        .iter()
        .filter(|o| matches!(o, FilterOutcome::Enriched(_)))
        .count();
    tracing::info!(records = records.len(), enriched, "filter finished");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for rec in &records {
        writeln!(out, "{}", to_json(rec, args.pretty)?)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let quantiles = match parse_quantiles_arg(args.quantiles.as_deref()) {
        Ok(q) => q,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match &args.cmd {
        Cmd::Stats => run_stats(&args, quantiles),
        Cmd::Filter {
            source,
            target,
            config,
        } => {
            let (source, target, config) = (source.clone(), target.clone(), config.clone());
            match run_filter(&args, quantiles, source, target, config.as_deref()) {
                Err(err) if err.downcast_ref::<EnrichError>().is_some() => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
                other => other,
            }
        }
    }
}

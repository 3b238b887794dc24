//! bcilog - command line entry point

mod cli;

use anyhow::{Context, Result};
use bcilog::config::AppConfig;
use bcilog::export::{export_csv, export_segments};
use bcilog::reconstruct::reconstruct;
use bcilog::{read_log, run_capture, HttpDevice, Reconstruction};
use clap::Parser;
use cli::{CaptureArgs, Cli, Command, ConvertArgs, InspectArgs};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let (config, config_path) = AppConfig::resolve(cli.config.clone());

    match cli.command {
        Command::Capture(args) => capture(args, config, &config_path),
        Command::Convert(args) => convert(args, &config),
        Command::Inspect(args) => inspect(args, &config),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("bcilog={level}").parse()?)
                .add_directive(format!("bcilog_core={level}").parse()?),
        )
        .init();
    Ok(())
}

fn default_log_name() -> PathBuf {
    PathBuf::from(chrono::Local::now().format("bci_%Y%m%d_%H%M%S.bci").to_string())
}

fn capture(args: CaptureArgs, mut app: AppConfig, config_path: &Path) -> Result<()> {
    let config = &mut app.capture;
    if let Some(ip) = args.ip {
        config.device_host = ip;
    }
    if let Some(transport) = args.transport {
        config.transport = transport.into();
    }
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(latency_us) = args.latency_us {
        config.latency_us = latency_us;
    }
    if let Some(secs) = args.silence_timeout {
        config.silence_timeout_ms = secs * 1000;
    }
    if let Some(policy) = args.duplicates {
        config.duplicate_policy = policy.into();
    }
    if args.save_config {
        app.save(config_path)?;
    }
    let config = &app.capture;

    let output = args.output.unwrap_or_else(default_log_name);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)).context("Failed to install Ctrl+C handler")?;

    println!("bcilog v{} - logging to {}", bcilog::VERSION, output.display());
    println!("Press Ctrl+C to stop");

    let device = HttpDevice::new(&config.device_host, config.transport).context("Failed to create device client")?;
    let summary = run_capture(&device, config, &output, &shutdown)
        .with_context(|| format!("Capture from {} failed", config.device_host))?;

    println!();
    println!("Pairs received:   {}", summary.pairs_received);
    println!("Records written:  {}", summary.records_written);
    println!("Dropped samples:  {} ({} events)", summary.dropped_samples, summary.loss_events);
    println!("Duplicates:       {}", summary.duplicates);
    println!("Framing errors:   {} ({} bytes discarded)", summary.framing_errors, summary.discarded_bytes);
    println!("Duration:         {:.1} s", summary.duration_secs);
    Ok(())
}

fn load_and_reconstruct(input: &Path, app: &AppConfig) -> Result<(bcilog::log::LogContents, Reconstruction)> {
    let contents = read_log(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let reconstruction = reconstruct(&contents.records, &app.reconstruct)
        .with_context(|| format!("Time-base reconstruction of {} failed", input.display()))?;
    Ok((contents, reconstruction))
}

fn convert(args: ConvertArgs, app: &AppConfig) -> Result<()> {
    let (_, reconstruction) = load_and_reconstruct(&args.input, app)?;
    let output = args.output.unwrap_or_else(|| args.input.with_extension("csv"));

    if args.split {
        let paths = export_segments(&reconstruction, &output, args.header)?;
        println!("Wrote {} segments", paths.len());
        for path in paths {
            println!("  {}", path.display());
        }
    } else {
        export_csv(&reconstruction, &output, args.header)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Wrote {} samples to {}", reconstruction.samples.len(), output.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct InspectReport {
    records: usize,
    resyncs: u64,
    discarded_bytes: u64,
    trailing_bytes: usize,
    lost_samples: u64,
    duplicates_skipped: u64,
    corrected_wraps: usize,
    segments: usize,
    duration_s: f64,
    window_radius: usize,
    max_hw_residual_ms: f64,
    clock_drift_ppm: Option<f64>,
    max_latency_ms: Option<f64>,
}

fn inspect(args: InspectArgs, app: &AppConfig) -> Result<()> {
    let (contents, reconstruction) = load_and_reconstruct(&args.input, app)?;

    let duration_s = match (reconstruction.samples.first(), reconstruction.samples.last()) {
        (Some(first), Some(last)) => last.system_time_s - first.system_time_s,
        _ => 0.0,
    };
    let report = InspectReport {
        records: contents.records.len(),
        resyncs: contents.framing.resyncs,
        discarded_bytes: contents.framing.discarded_bytes,
        trailing_bytes: contents.trailing_bytes,
        lost_samples: reconstruction.lost_samples,
        duplicates_skipped: reconstruction.duplicates_skipped,
        corrected_wraps: reconstruction.corrected_boundaries.len(),
        segments: reconstruction.segment_ranges().len(),
        duration_s,
        window_radius: reconstruction.window_radius,
        max_hw_residual_ms: reconstruction.max_hw_residual_ms,
        clock_drift_ppm: reconstruction.clock.map(|c| (c.slope - 1.0) * 1e6),
        max_latency_ms: reconstruction.clock.map(|c| c.max_latency_ms),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Log:              {}", args.input.display());
    println!("Records:          {}", report.records);
    println!("Framing errors:   {} ({} bytes discarded)", report.resyncs, report.discarded_bytes);
    println!("Trailing bytes:   {}", report.trailing_bytes);
    println!("Lost samples:     {}", report.lost_samples);
    println!("Repeated records: {}", report.duplicates_skipped);
    println!("Corrected wraps:  {}", report.corrected_wraps);
    println!("Segments:         {}", report.segments);
    println!("Duration:         {:.3} s", report.duration_s);
    println!("Rate window:      +/-{} samples", report.window_radius);
    println!("Max hw residual:  {:.3} ms", report.max_hw_residual_ms);
    if let (Some(ppm), Some(latency)) = (report.clock_drift_ppm, report.max_latency_ms) {
        println!("Clock drift:      {:+.1} ppm", ppm);
        println!("Max latency:      {:.3} ms", latency);
    }
    Ok(())
}

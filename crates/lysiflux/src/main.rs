use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use lysiflux_core::frame::{events_frame, frame_from_csv, water_balance_frame, TIMESTAMP_COLUMN};
use lysiflux_core::pipeline::{run_frame, Annotations};
use lysiflux_core::{
    parse_manual_events, CalibrationParameters, CalibrationPresets, ReferenceEtSeries, RunConfig,
    RunSummary, RunWarning,
};
use polars::prelude::*;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "LYSIFLUX_CONFIG";
const OUTPUT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser, Debug)]
#[command(author, version, about = "Lysimeter water balance and NSE detection", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect NSEs and compute the water balance for a merged signal table
    Run(RunArgs),
    /// List the standard calibration presets
    Presets,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Merged signal CSV: timestamp column followed by one mV/V column per channel
    #[arg(long)]
    signal: PathBuf,
    /// Run configuration TOML (falls back to LYSIFLUX_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Manual event table (Event Type, Start Datetime, Stop Datetime, Notes)
    #[arg(long)]
    manual_events: Option<PathBuf>,
    /// Reference ET CSV: timestamp, ETr (mm)
    #[arg(long)]
    reference_et: Option<PathBuf>,
    /// Directory for water_balance.csv, events.csv and summary.json
    #[arg(long)]
    output: PathBuf,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    summary: &'a RunSummary,
    warnings: &'a [RunWarning],
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Presets => handle_presets(),
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .with_context(|| format!("--config not given and {CONFIG_ENV} is not set"))?,
    };
    let content = read_text(&config_path, "run configuration")?;
    let config = RunConfig::from_toml_str(&content).with_context(|| {
        format!("Failed to parse run configuration from '{}'", config_path.display())
    })?;
    let settings = config.resolve().context("Invalid run configuration")?;

    let signal = frame_from_csv(&read_text(&args.signal, "signal table")?)
        .with_context(|| format!("Failed to load signal table '{}'", args.signal.display()))?;

    let manual_events = args
        .manual_events
        .as_deref()
        .map(|path| read_text(path, "manual event table"))
        .transpose()?
        .map(|content| parse_manual_events(&content));

    let reference_et = args
        .reference_et
        .as_deref()
        .map(load_reference_et)
        .transpose()?;

    let output = run_frame(
        &signal,
        &settings,
        Annotations {
            manual_events: manual_events.as_ref(),
            reference_et: reference_et.as_ref(),
        },
    )
    .context("Water balance run failed")?;

    fs::create_dir_all(&args.output).with_context(|| {
        format!("Failed to create output directory '{}'", args.output.display())
    })?;

    let mut balance = water_balance_frame(&output.channels, reference_et.is_some())?;
    write_csv(&mut balance, &args.output.join("water_balance.csv"))?;

    let mut events = events_frame(&output.channels)?;
    write_csv(&mut events, &args.output.join("events.csv"))?;

    let summary_path = args.output.join("summary.json");
    let file = File::create(&summary_path)
        .with_context(|| format!("Failed to create '{}'", summary_path.display()))?;
    serde_json::to_writer_pretty(
        file,
        &SummaryFile {
            summary: &output.summary,
            warnings: &output.warnings,
        },
    )?;

    for channel in &output.summary.channels {
        println!(
            "{}: {} NSEs, {} interpolated intervals, total ETa {:.2} mm",
            channel.channel,
            channel.nse_count,
            channel.interpolated_intervals,
            channel.total_eta_mm
        );
    }
    if !output.warnings.is_empty() {
        println!("{} warnings (see summary.json)", output.warnings.len());
    }
    info!(output = %args.output.display(), "Outputs written");

    Ok(())
}

fn handle_presets() -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Type",
        "Alpha (kg per mV/V)",
        "Beta (m²)",
        "CF (mm per mV/V)",
        "Threshold (mV/V)",
    ]);

    for (code, preset) in CalibrationPresets::standard().iter() {
        let resolved =
            CalibrationParameters::new(code, preset.alpha, preset.beta, preset.threshold)?;
        table.add_row(vec![
            code.to_string(),
            format!("{:.3}", preset.alpha),
            format!("{:.3}", preset.beta),
            format!("{:.2}", resolved.conversion_factor),
            format!("{}", preset.threshold),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} at '{}'", path.display()))
}

fn load_reference_et(path: &Path) -> Result<ReferenceEtSeries> {
    let df = frame_from_csv(&read_text(path, "reference ET table")?)
        .with_context(|| format!("Failed to load reference ET table '{}'", path.display()))?;
    let Some(value_column) = df
        .get_column_names()
        .into_iter()
        .find(|name| name.as_str() != TIMESTAMP_COLUMN)
        .map(|name| name.to_string())
    else {
        bail!("reference ET table '{}' has no ETr column", path.display());
    };
    Ok(ReferenceEtSeries::from_frame(&df, TIMESTAMP_COLUMN, &value_column)?)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_datetime_format(Some(OUTPUT_DATETIME_FORMAT.to_string()))
        .finish(df)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}

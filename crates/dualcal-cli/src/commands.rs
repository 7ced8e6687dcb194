//! Calibration subcommands
//!
//! Each `execute_*` function backs one [`crate::Commands`] variant. Hardware
//! access goes through a recorded capture ([`ReplayMeasurementPort`]); a run
//! without one can only be served from the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tracing::{info, warn};

use dualcal_core::config::{CalibrationConfig, CalibrationMode, PlanMode};
use dualcal_core::domain::{FusedCalibrationResult, RunReport, SpectrumHint, UnitStatus};
use dualcal_engine::{
    CacheLookup, CalibrationCache, CalibrationOrchestrator, RecalibrationEvent,
    RecalibrationTask, ReplayCapture, ReplayMeasurementPort, RunOptions,
};

/// Default distance in Hz between a requested and a recorded frequency.
pub const DEFAULT_TOLERANCE_HZ: f64 = 1000.0;

// ============================================================================
// Arguments
// ============================================================================

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (defaults are used if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Speed / accuracy preset applied on top of the configuration
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Recorded capture to measure from
    #[arg(short, long)]
    pub replay: Option<PathBuf>,

    /// Largest accepted distance between requested and recorded frequency
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_HZ)]
    pub tolerance_hz: f64,

    /// Pre-scan spectrum for signal-informed planning
    #[arg(short, long)]
    pub spectrum: Option<PathBuf>,

    /// Write the fused result to this file as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Measure even if a fresh cached calibration exists
    #[arg(long)]
    pub no_cache: bool,

    /// Abandon the run after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the init-config command
#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the configuration
    pub path: PathBuf,

    /// Preset applied to the defaults
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the inspect-cache command
#[derive(Args, Debug)]
pub struct InspectCacheArgs {
    /// Configuration whose cache entry is inspected
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Configuration file (defaults are used if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Recorded capture to measure from
    #[arg(short, long)]
    pub replay: PathBuf,

    /// Largest accepted distance between requested and recorded frequency
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_HZ)]
    pub tolerance_hz: f64,

    /// Seconds between recalibrations
    #[arg(short, long, default_value = "600")]
    pub interval_secs: u64,

    /// Stop after this many outcomes (runs until interrupted if omitted)
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,
}

/// Preset argument enum for CLI
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Fast,
    Balanced,
    Precise,
}

impl From<ModeArg> for CalibrationMode {
    fn from(val: ModeArg) -> Self {
        match val {
            ModeArg::Fast => CalibrationMode::Fast,
            ModeArg::Balanced => CalibrationMode::Balanced,
            ModeArg::Precise => CalibrationMode::Precise,
        }
    }
}

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

// ============================================================================
// Display Structs for Tables
// ============================================================================

/// Unit display row for tables
#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Noise floor (dB)")]
    noise_floor: String,
    #[tabled(rename = "Measured")]
    measured: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Shared ref")]
    shared: String,
}

fn unit_rows(result: &FusedCalibrationResult) -> Vec<UnitRow> {
    result
        .units
        .iter()
        .map(|u| UnitRow {
            unit: u.unit_id.to_string(),
            status: match &u.status {
                UnitStatus::Success => "ok".to_owned(),
                UnitStatus::Failed { .. } => "FAILED".to_owned(),
            },
            noise_floor: u
                .noise_floor_db
                .map_or_else(|| "-".to_owned(), |db| format!("{db:.2}")),
            measured: u.measurements.len(),
            failed: u.failures.len(),
            shared: if u.shared_reference_applied { "yes" } else { "no" }.to_owned(),
        })
        .collect()
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Execute the run command
pub async fn execute_run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.mode)?;
    let cache = Arc::new(CalibrationCache::file(&config.cache_path));

    let port = match &args.replay {
        Some(path) => load_replay(path, args.tolerance_hz)?,
        None => {
            let servable =
                config.cache_enabled && !args.no_cache && cache.inspect(&config).is_fresh();
            if !servable {
                bail!(
                    "no fresh cached calibration at {}; pass --replay <capture> to measure",
                    cache.location()
                );
            }
            ReplayMeasurementPort::from_capture(ReplayCapture::default(), args.tolerance_hz)?
        }
    };

    let spectrum_hint = args.spectrum.as_deref().map(load_spectrum).transpose()?;
    if spectrum_hint.is_some() && config.plan_mode == PlanMode::FixedStep {
        warn!("spectrum ignored: plan_mode is fixed_step");
    }
    let options = RunOptions {
        spectrum_hint,
        skip_cache_lookup: args.no_cache,
    };

    let orchestrator = CalibrationOrchestrator::new(Arc::new(port), cache);
    let report = match args.deadline_secs {
        Some(secs) => {
            orchestrator
                .run_with_deadline(&config, &options, Duration::from_secs(secs))
                .await?
        }
        None => orchestrator.run_with_options(&config, &options).await?,
    };

    if let Some(path) = &args.output {
        write_json(path, &report.result)?;
        info!(path = %path.display(), "fused result written");
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

/// Execute the init-config command
pub async fn execute_init_config(args: InitConfigArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.path.display()
        );
    }
    let mut config = CalibrationConfig::default();
    if let Some(mode) = args.mode {
        config = config.with_mode(mode.into());
    }
    config.to_json(&args.path)?;
    println!(
        "{} wrote default configuration to {}",
        "[DUALCAL]".bright_cyan().bold(),
        args.path.display()
    );
    Ok(())
}

/// Execute the inspect-cache command
pub async fn execute_inspect_cache(args: InspectCacheArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), None)?;
    let cache = CalibrationCache::file(&config.cache_path);
    let lookup = cache.inspect(&config);

    println!("{}", "Calibration Cache".bold().cyan());
    println!("{}", "=".repeat(50));
    println!("  {} {}", "Location:".dimmed(), cache.location());
    let status = match &lookup {
        CacheLookup::Fresh(_) => lookup.to_string().green(),
        CacheLookup::Stale { .. }
        | CacheLookup::FingerprintMismatch { .. }
        | CacheLookup::SchemaMismatch { .. } => lookup.to_string().yellow(),
        CacheLookup::Absent => lookup.to_string().dimmed(),
        CacheLookup::Unreadable { .. } => lookup.to_string().red(),
    };
    println!("  {} {}", "Status:".dimmed(), status);

    if let CacheLookup::Fresh(record) = &lookup {
        let age = record.age_at(Utc::now());
        println!("  {} {}s", "Age:".dimmed(), age.num_seconds());
        let ttl = i64::try_from(config.cache_ttl_seconds).unwrap_or(i64::MAX);
        println!(
            "  {} {}s",
            "TTL remaining:".dimmed(),
            ttl.saturating_sub(age.num_seconds())
        );
        println!(
            "  {} {} of {} succeeded",
            "Units:".dimmed(),
            record.payload.success_count(),
            record.payload.units.len()
        );
    }
    Ok(())
}

/// Execute the watch command
pub async fn execute_watch(args: WatchArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), None)?;
    let port = load_replay(&args.replay, args.tolerance_hz)?;
    let cache = Arc::new(CalibrationCache::file(&config.cache_path));
    let orchestrator = Arc::new(CalibrationOrchestrator::new(Arc::new(port), cache));

    // Each tick measures; the cache only records the latest result.
    let options = RunOptions {
        skip_cache_lookup: true,
        ..RunOptions::default()
    };
    let task = RecalibrationTask::spawn_with_options(
        orchestrator,
        config,
        options,
        Duration::from_secs(args.interval_secs),
    );
    let mut events = task.subscribe();

    println!(
        "{} recalibrating every {}s (Ctrl+C to stop)",
        "[DUALCAL]".bright_cyan().bold(),
        args.interval_secs
    );

    let mut seen: u64 = 0;
    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        };
        let Some(event) = event else {
            break;
        };
        print_event(&event);
        seen += 1;
        if args.iterations.is_some_and(|limit| seen >= limit) {
            break;
        }
    }

    task.stop().await;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(path: Option<&Path>, mode: Option<ModeArg>) -> Result<CalibrationConfig> {
    let config = match path {
        Some(path) => CalibrationConfig::from_json(path)?,
        None => CalibrationConfig::default(),
    };
    let config = match mode {
        Some(mode) => config.with_mode(mode.into()),
        None => config,
    };
    config.validate()?;
    Ok(config)
}

fn load_replay(path: &Path, tolerance_hz: f64) -> Result<ReplayMeasurementPort> {
    ReplayMeasurementPort::from_file(path, tolerance_hz)
        .with_context(|| format!("failed to load replay capture {}", path.display()))
}

fn load_spectrum(path: &Path) -> Result<SpectrumHint> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spectrum {}", path.display()))?;
    let hint: SpectrumHint = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse spectrum {}", path.display()))?;
    hint.check()?;
    Ok(hint)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn print_report(report: &RunReport) {
    let result = &report.result;
    let tag = if report.metrics.cache_hit {
        "[CACHED]".green().bold()
    } else if result.is_degraded() {
        "[DEGRADED]".yellow().bold()
    } else {
        "[OK]".green().bold()
    };
    println!("{} {}", "[DUALCAL]".bright_cyan().bold(), tag);
    println!();

    let table = Table::new(unit_rows(result)).with(Style::rounded()).to_string();
    println!("{table}");

    if let Some(shared) = &result.shared {
        println!(
            "  {} {:.2} dB from {} units",
            "Shared noise floor:".dimmed(),
            shared.noise_floor_db,
            shared.contributing_units.len()
        );
    }
    for failure in result.failed_units() {
        println!("  {} {}", "Failed:".red().bold(), failure);
    }
    if let Some(plan) = &report.plan {
        println!(
            "  {} {} frequencies ({:?})",
            "Plan:".dimmed(),
            plan.len(),
            plan.source()
        );
    }
    println!();
    print!("{}", report.metrics);
}

fn print_event(event: &RecalibrationEvent) {
    let stamp = Utc::now().format("%H:%M:%S");
    match event {
        RecalibrationEvent::Completed { iteration, report } => {
            let shared = report
                .result
                .shared
                .as_ref()
                .map_or_else(|| "-".to_owned(), |s| format!("{:.2} dB", s.noise_floor_db));
            println!(
                "{} {} {} units ok, shared noise floor {}, {:.2}s",
                stamp.to_string().dimmed(),
                format!("[run {iteration}]").bold(),
                format!(
                    "{}/{}",
                    report.result.success_count(),
                    report.result.units.len()
                )
                .green(),
                shared,
                report.metrics.total.as_secs_f64()
            );
        }
        RecalibrationEvent::Failed { iteration, error } => {
            println!(
                "{} {} {}",
                stamp.to_string().dimmed(),
                format!("[run {iteration}]").bold(),
                error.red()
            );
        }
    }
}

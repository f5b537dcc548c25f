//! otelab CLI: replay recorded bars and structure events through the decision engine.
//!
//! Commands:
//! - `replay`: run a bar CSV and an events JSON against the paper gateway
//! - `check-config`: load and validate an engine TOML config, print the effective values

mod replay;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use otelab_core::EngineConfig;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use replay::{load_bars, load_events, run_replay, EventFile, ReplaySettings, ReplaySummary};

#[derive(Parser)]
#[command(
    name = "otelab",
    about = "otelab CLI: sweep, break and retracement decision engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay closed bars and structure events against the paper gateway.
    Replay {
        /// Bars CSV with a `time,open,high,low,close` header (RFC 3339 times).
        #[arg(long)]
        bars: PathBuf,

        /// Structure events JSON: `sweeps`, `breaks`, `zones`, `liquidity_levels`.
        #[arg(long)]
        events: Option<PathBuf>,

        /// Engine config TOML. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 0.0001)]
        pip_size: f64,

        /// Price digits for rounding.
        #[arg(long, default_value_t = 5)]
        digits: u32,

        /// Constant spread added to the close to form the ask.
        #[arg(long, default_value_t = 1.0)]
        spread_pips: f64,

        #[arg(long, default_value_t = 10_000.0)]
        equity: f64,

        #[arg(long, default_value_t = 100.0)]
        leverage: f64,

        /// Write the JSON summary here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load and validate a config file, then print it with defaults filled in.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otelab=info,otelab_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            bars,
            events,
            config,
            pip_size,
            digits,
            spread_pips,
            equity,
            leverage,
            output,
        } => {
            let settings = ReplaySettings {
                pip_size,
                digits,
                spread_pips,
                equity,
                leverage,
            };
            run_replay_cmd(&bars, events.as_deref(), config.as_deref(), &settings, output.as_deref())
        }
        Commands::CheckConfig { config } => run_check_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("invalid config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run_replay_cmd(
    bars_path: &Path,
    events_path: Option<&Path>,
    config_path: Option<&Path>,
    settings: &ReplaySettings,
    output: Option<&Path>,
) -> Result<()> {
    if !(settings.pip_size > 0.0) {
        bail!("--pip-size must be positive, got {}", settings.pip_size);
    }
    if !(settings.spread_pips >= 0.0) {
        bail!("--spread-pips must be non-negative, got {}", settings.spread_pips);
    }
    if !(settings.equity > 0.0) {
        bail!("--equity must be positive, got {}", settings.equity);
    }

    let config = load_config(config_path)?;
    let bars = load_bars(bars_path)?;
    if bars.is_empty() {
        bail!("no bars in {}", bars_path.display());
    }
    let events = match events_path {
        Some(path) => load_events(path)?,
        None => EventFile::default(),
    };
    info!(
        bars = bars.len(),
        sweeps = events.sweeps.len(),
        breaks = events.breaks.len(),
        zones = events.zones.len(),
        "Starting replay"
    );

    let summary = run_replay(config, bars, &events, settings)?;
    let json = serde_json::to_string_pretty(&summary)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("cannot write {}", path.display()))?;
            print_summary(&summary);
            println!("Summary written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_summary(summary: &ReplaySummary) {
    println!("Bars:            {}", summary.bars);
    println!("Entries:         {}", summary.entries.len());
    println!("Closed slices:   {}", summary.trades.len());
    println!("Open positions:  {}", summary.open_positions);
    println!("Realized PnL:    {:.2}", summary.realized_pnl);
    println!("Final equity:    {:.2}", summary.final_equity);
    if !summary.failures.is_empty() {
        println!();
        println!("{:<32} {:>6}", "Failure", "Count");
        println!("{}", "-".repeat(39));
        for (kind, count) in &summary.failures {
            println!("{kind:<32} {count:>6}");
        }
    }
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = load_config(Some(path))?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    info!(path = %path.display(), "Config is valid");
    Ok(())
}

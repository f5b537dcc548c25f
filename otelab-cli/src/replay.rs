//! Offline replay: feed recorded bars and structure events through the engine
//! against the paper gateway.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use otelab_core::domain::{
    AccountState, Bar, BarSeries, MarketSnapshot, RetracementZone, StructureEvent,
};
use otelab_core::engine::EntryOutcome;
use otelab_core::gateway::PaperTrade;
use otelab_core::{BarInput, DecisionEngine, EngineConfig, EngineError, PaperGateway};

/// One CSV row: `time,open,high,low,close` with RFC 3339 timestamps.
#[derive(Debug, Deserialize)]
struct BarRow {
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

/// Structure events produced upstream, as one JSON document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventFile {
    pub sweeps: Vec<StructureEvent>,
    pub breaks: Vec<StructureEvent>,
    pub zones: Vec<RetracementZone>,
    pub liquidity_levels: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ReplaySettings {
    pub pip_size: f64,
    pub digits: u32,
    pub spread_pips: f64,
    pub equity: f64,
    pub leverage: f64,
}

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub bars: usize,
    pub entries: Vec<EntryOutcome>,
    /// Failed or rejected steps by kind.
    pub failures: BTreeMap<String, usize>,
    pub trades: Vec<PaperTrade>,
    pub realized_pnl: f64,
    pub final_equity: f64,
    pub open_positions: usize,
}

pub fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open bars file {}", path.display()))?;
    let mut bars = Vec::new();
    for (line, row) in reader.deserialize::<BarRow>().enumerate() {
        let row = row.with_context(|| format!("bad bar on data row {}", line + 1))?;
        bars.push(Bar::new(row.time, row.open, row.high, row.low, row.close));
    }
    Ok(bars)
}

pub fn load_events(path: &Path) -> Result<EventFile> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open events file {}", path.display()))?;
    let mut events: EventFile = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("cannot parse events file {}", path.display()))?;
    events.sweeps.sort_by_key(|e| e.time);
    events.breaks.sort_by_key(|e| e.time);
    events.zones.sort_by_key(|z| z.time);
    Ok(events)
}

/// Number of leading items whose time is at or before `time`.
fn visible<T>(
    items: &[T],
    cursor: &mut usize,
    time: DateTime<Utc>,
    at: impl Fn(&T) -> DateTime<Utc>,
) -> usize {
    while *cursor < items.len() && at(&items[*cursor]) <= time {
        *cursor += 1;
    }
    *cursor
}

fn failure_key(error: &EngineError) -> String {
    match error {
        EngineError::GuardRejected(rejection) => format!("guard:{}", rejection.reason),
        EngineError::SequenceGateFailed { .. } => "sequence_gate".to_string(),
        EngineError::InsufficientHistory { .. } => "insufficient_history".to_string(),
        EngineError::GatewayFailed { .. } => "gateway".to_string(),
        EngineError::UnknownPosition(_) => "unknown_position".to_string(),
        EngineError::ZeroRiskFill(_) => "zero_risk_fill".to_string(),
    }
}

pub fn run_replay(
    config: EngineConfig,
    bars: Vec<Bar>,
    events: &EventFile,
    settings: &ReplaySettings,
) -> Result<ReplaySummary> {
    let contract_size = config.broker.contract_size;
    let mut engine = DecisionEngine::new(config).context("engine config rejected")?;
    let mut gateway = PaperGateway::new();
    let mut series = BarSeries::new();
    let mut summary = ReplaySummary {
        bars: 0,
        entries: Vec::new(),
        failures: BTreeMap::new(),
        trades: Vec::new(),
        realized_pnl: 0.0,
        final_equity: settings.equity,
        open_positions: 0,
    };
    let (mut sweeps, mut breaks, mut zones) = (0, 0, 0);

    for bar in bars {
        let time = bar.time;
        let close = bar.close;

        // Stops and targets resting from earlier bars trade inside this one.
        for id in gateway.process_bar(&bar) {
            if let Err(e) = engine.on_position_closed(id) {
                warn!(position = %id, error = %e, "Venue closed a position the engine did not track");
            }
        }
        series
            .push(bar)
            .with_context(|| format!("bar at {time} rejected"))?;
        summary.bars += 1;

        let realized: f64 = gateway
            .trades()
            .iter()
            .map(|t| t.price_move() * t.volume * contract_size)
            .sum();
        let equity = settings.equity + realized;
        let account = AccountState {
            equity,
            free_margin: equity,
            leverage: settings.leverage,
        };

        gateway.set_market(time, close);
        let snapshot = MarketSnapshot::from_quotes(
            time,
            close,
            close + settings.spread_pips * settings.pip_size,
            settings.pip_size,
            settings.digits,
        );
        let input = BarInput {
            series: &series,
            snapshot: &snapshot,
            account: &account,
            sweeps: &events.sweeps[..visible(&events.sweeps, &mut sweeps, time, |e| e.time)],
            breaks: &events.breaks[..visible(&events.breaks, &mut breaks, time, |e| e.time)],
            zones: &events.zones[..visible(&events.zones, &mut zones, time, |z| z.time)],
            liquidity_levels: &events.liquidity_levels,
        };
        let report = engine.on_bar(&input, &mut gateway);

        if let Some(entry) = report.entry {
            summary.entries.push(entry);
        }
        for error in &report.errors {
            *summary.failures.entry(failure_key(error)).or_default() += 1;
        }

        // Requested full closes execute immediately on paper.
        let open = gateway.open_positions();
        let confirmed: Vec<_> = engine
            .risk()
            .book()
            .iter()
            .filter(|r| r.pending_close && !open.contains(&r.id))
            .map(|r| r.id)
            .collect();
        for id in confirmed {
            engine.on_position_closed(id)?;
        }
    }

    summary.trades = gateway.trades().to_vec();
    summary.realized_pnl = summary
        .trades
        .iter()
        .map(|t| t.price_move() * t.volume * contract_size)
        .sum();
    summary.final_equity = settings.equity + summary.realized_pnl;
    summary.open_positions = gateway.open_positions().len();

    info!(
        bars = summary.bars,
        entries = summary.entries.len(),
        trades = summary.trades.len(),
        realized_pnl = summary.realized_pnl,
        "Replay finished"
    );
    Ok(summary)
}

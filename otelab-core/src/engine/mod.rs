//! Decision engine: one object that owns every stateful component and runs the
//! per-bar sequence.
//!
//! Each closed bar runs, in order:
//!
//! 1. Advisory refresh (non-blocking)
//! 2. Episode update with the events first seen on this bar
//! 3. Volatility reading
//! 4. Exit battery over every open position
//! 5. Entry attempt from a tapped, locked zone
//!
//! Nothing in the bar path returns an error to the caller. Failures are logged
//! once here and carried in the `BarReport`.

pub mod entry;

pub use entry::{EntryPlan, SignalBuilder};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::advisory::{AdvisoryCache, AdvisoryReader};
use crate::config::EngineConfig;
use crate::domain::{
    AccountState, BarSeries, Direction, MarketSnapshot, PositionId, RetracementZone,
    StructureEvent,
};
use crate::episode::{EpisodeEvent, EpisodeManager, EpisodeUpdate};
use crate::error::{ConfigError, EngineError};
use crate::gateway::OrderGateway;
use crate::guard::{ExecutionGuard, GuardRejection, RejectionReason};
use crate::indicators::volatility::MIN_HISTORY_BARS;
use crate::indicators::{VolatilityClassifier, VolatilityReading};
use crate::position_management::{
    ExitContext, ManagementAction, ManagementReport, PositionRecord, PositionRiskManager,
};
use crate::sequence::{GateTier, SequenceGate};
use crate::sizing::StopLossSizer;

/// Everything the engine needs for one closed bar.
///
/// Event lists are chronological and append-only across calls; the engine keeps
/// a cursor per list and treats entries past it as new on this bar.
#[derive(Debug, Clone, Copy)]
pub struct BarInput<'a> {
    pub series: &'a BarSeries,
    pub snapshot: &'a MarketSnapshot,
    pub account: &'a AccountState,
    pub sweeps: &'a [StructureEvent],
    pub breaks: &'a [StructureEvent],
    pub zones: &'a [RetracementZone],
    /// Candidate take-profit levels (external liquidity).
    pub liquidity_levels: &'a [f64],
}

/// A position opened on this bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryOutcome {
    pub position_id: PositionId,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence: f64,
    pub tier: Option<GateTier>,
}

#[derive(Debug, Clone, Default)]
pub struct BarReport {
    pub time: Option<DateTime<Utc>>,
    pub episode_events: Vec<EpisodeEvent>,
    pub volatility: Option<VolatilityReading>,
    pub management: Vec<ManagementAction>,
    pub entry: Option<EntryOutcome>,
    pub errors: Vec<EngineError>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursors {
    sweeps: usize,
    breaks: usize,
    zones: usize,
}

fn fresh<T>(list: &[T], cursor: &mut usize) -> std::ops::Range<usize> {
    let start = (*cursor).min(list.len());
    *cursor = list.len();
    start..list.len()
}

pub struct DecisionEngine {
    config: EngineConfig,
    episodes: EpisodeManager,
    gate: SequenceGate,
    classifier: VolatilityClassifier,
    signals: SignalBuilder,
    guard: ExecutionGuard,
    risk: PositionRiskManager,
    advisory: AdvisoryReader,
    cursors: Cursors,
    last_volatility: Option<VolatilityReading>,
}

impl DecisionEngine {
    /// Fails on a config that `EngineConfig::validate` rejects.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_advisory(config, AdvisoryReader::detached())
    }

    /// Engine that reads advisories published to `cache`.
    pub fn with_advisory_cache(
        config: EngineConfig,
        cache: AdvisoryCache,
    ) -> Result<Self, ConfigError> {
        Self::with_advisory(config, AdvisoryReader::new(cache))
    }

    fn with_advisory(config: EngineConfig, advisory: AdvisoryReader) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            episodes: EpisodeManager::new(config.episode.clone(), config.sweep_filter.clone()),
            gate: SequenceGate::new(config.sequence.clone(), config.sweep_filter.clone()),
            classifier: VolatilityClassifier::new(config.volatility.clone())?,
            signals: SignalBuilder::new(
                config.entry.clone(),
                &config.risk,
                StopLossSizer::new(config.stop_sizer.clone())?,
            ),
            guard: ExecutionGuard::new(
                config.guard.clone(),
                config.risk.clone(),
                config.broker.clone(),
            ),
            risk: PositionRiskManager::new(&config.exits, config.broker.clone()),
            advisory,
            cursors: Cursors::default(),
            last_volatility: None,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn episodes(&self) -> &EpisodeManager {
        &self.episodes
    }

    pub fn risk(&self) -> &PositionRiskManager {
        &self.risk
    }

    /// Process one closed bar.
    pub fn on_bar(&mut self, input: &BarInput<'_>, gateway: &mut dyn OrderGateway) -> BarReport {
        let mut report = BarReport {
            time: input.series.last().map(|b| b.time),
            ..BarReport::default()
        };

        self.advisory.refresh();

        let new_sweeps = &input.sweeps[fresh(input.sweeps, &mut self.cursors.sweeps)];
        let new_breaks = &input.breaks[fresh(input.breaks, &mut self.cursors.breaks)];
        let new_zones = &input.zones[fresh(input.zones, &mut self.cursors.zones)];

        report.episode_events = self.episodes.update(&EpisodeUpdate {
            series: input.series,
            new_sweeps,
            new_breaks,
            new_zones,
            liquidity_levels: input.liquidity_levels,
            pip_size: input.snapshot.pip_size,
        });

        let volatility = self.classifier.classify(input.series.as_slice());
        self.last_volatility = Some(volatility);
        report.volatility = Some(volatility);

        let managed = self.manage(input.series, input.snapshot, new_breaks, gateway);
        report.management = managed.actions;
        report.errors.extend(managed.errors);

        match self.try_entry(input, &volatility, gateway) {
            Ok(outcome) => report.entry = outcome,
            Err(e) => report.errors.push(e),
        }

        for e in &report.errors {
            log_failure(e);
        }
        report
    }

    /// Run the exit battery on a price update between bars.
    pub fn on_tick(
        &mut self,
        series: &BarSeries,
        snapshot: &MarketSnapshot,
        gateway: &mut dyn OrderGateway,
    ) -> ManagementReport {
        let report = self.manage(series, snapshot, &[], gateway);
        for e in &report.errors {
            log_failure(e);
        }
        report
    }

    /// The venue reports a position gone (stop, target or requested close).
    pub fn on_position_closed(&mut self, id: PositionId) -> Result<PositionRecord, EngineError> {
        self.risk.on_closed(id)
    }

    fn manage(
        &mut self,
        series: &BarSeries,
        snapshot: &MarketSnapshot,
        new_breaks: &[StructureEvent],
        gateway: &mut dyn OrderGateway,
    ) -> ManagementReport {
        if self.risk.book().is_empty() {
            return ManagementReport::default();
        }
        let atr = self
            .last_volatility
            .filter(VolatilityReading::is_usable)
            .map_or(0.0, |v| v.atr);
        let ctx = ExitContext::build(
            series.as_slice(),
            snapshot,
            atr,
            new_breaks,
            &self.config.exits,
        );
        self.risk.update(&ctx, gateway)
    }

    fn try_entry(
        &mut self,
        input: &BarInput<'_>,
        volatility: &VolatilityReading,
        gateway: &mut dyn OrderGateway,
    ) -> Result<Option<EntryOutcome>, EngineError> {
        let Some(candidate) = self.episodes.entry_candidate() else {
            return Ok(None);
        };
        let Some(bar) = input.series.last() else {
            return Ok(None);
        };
        if !candidate.zone.is_tapped_by(bar) {
            return Ok(None);
        }
        let direction = candidate.direction();
        let sweep = candidate.sweep.clone();
        let structure_break = candidate.structure_break.clone();
        let opposite_liquidity = candidate.opposite_liquidity;

        // The gate judges the pair this episode locked, not whatever else is on the tape.
        let gate = self.gate.check(
            direction,
            std::slice::from_ref(&sweep),
            std::slice::from_ref(&structure_break),
            input.series,
        );
        if !gate.passed {
            return Err(EngineError::SequenceGateFailed { direction });
        }
        if self.advisory.entries_blocked() {
            return Err(GuardRejection::new(
                RejectionReason::AdvisoryBlock,
                "entries blocked by advisory",
            )
            .into());
        }
        if !volatility.is_usable() {
            return Err(EngineError::InsufficientHistory {
                needed: MIN_HISTORY_BARS,
                available: input.series.len(),
            });
        }

        let plan = self.signals.build(
            direction,
            &sweep,
            opposite_liquidity,
            gate.tier,
            input.snapshot,
            volatility,
        );
        let vetted = self.guard.vet(
            &plan.signal,
            input.snapshot,
            input.account,
            volatility,
            self.advisory.risk_multiplier(),
            &self.config.entry.order_label,
        )?;

        // Pre-submit rejections leave the zone armed for a later tap.
        self.episodes.mark_entry();
        let fill = gateway.submit(&vetted.request)?;
        let position_id = self.risk.on_fill(&fill, plan.signal.confidence)?;
        info!(
            position = %position_id,
            direction = %direction,
            volume = fill.volume,
            entry = fill.entry_price,
            stop = fill.stop_loss,
            target = fill.take_profit,
            tier = ?gate.tier,
            "Entry filled"
        );
        Ok(Some(EntryOutcome {
            position_id,
            direction,
            volume: fill.volume,
            entry_price: fill.entry_price,
            stop_loss: fill.stop_loss,
            take_profit: fill.take_profit,
            confidence: plan.signal.confidence,
            tier: gate.tier,
        }))
    }
}

fn log_failure(e: &EngineError) {
    match e {
        e if e.is_rejection() => info!(reason = %e, "Entry rejected"),
        EngineError::GatewayFailed { .. } | EngineError::InsufficientHistory { .. } => {
            warn!(error = %e, "Bar step failed")
        }
        _ => error!(error = %e, "Bar step failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_refused_at_construction() {
        let mut config = EngineConfig::default();
        config.stop_sizer.max_abs_pips = 10.0;
        assert!(matches!(
            DecisionEngine::new(config),
            Err(ConfigError::Invalid { field: "stop_sizer.max_abs_pips", .. })
        ));
        assert!(DecisionEngine::new(EngineConfig::default()).is_ok());
    }

    #[test]
    fn fresh_advances_cursor_and_tolerates_shrinking_lists() {
        let mut cursor = 0;
        assert_eq!(fresh(&[1, 2, 3], &mut cursor), 0..3);
        assert_eq!(fresh(&[1, 2, 3, 4], &mut cursor), 3..4);
        assert_eq!(fresh(&[1, 2, 3, 4], &mut cursor), 4..4);
        assert_eq!(fresh(&[1], &mut cursor), 1..1);
        assert_eq!(cursor, 1);
    }
}

//! Causal sequence gate: a sweep happened, then a matching structure break after it.
//!
//! Tiers are tried in order and the first pass wins:
//! - `Strict`: newest accepted sweep at most `lookback` bars old, a break in the
//!   entry direction strictly after it.
//! - `Extended` (fallback): the same with a `2 * lookback` window.
//! - `AnyDirection` (fallback, only when no break in the entry direction
//!   followed the sweep at all): any break after the newest accepted sweep
//!   within `4 * lookback`.
//!
//! Breaks are scanned newest first and the scan stops at the first break at or
//! before the sweep time. Callers that need strict causality disable fallback.

use serde::{Deserialize, Serialize};

use crate::config::{SequenceConfig, SweepFilter};
use crate::domain::{BarSeries, Direction, StructureEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateTier {
    Strict,
    Extended,
    AnyDirection,
}

impl GateTier {
    fn window_multiple(self) -> usize {
        match self {
            GateTier::Strict => 1,
            GateTier::Extended => 2,
            GateTier::AnyDirection => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceGateResult {
    pub passed: bool,
    /// Index into the sweep list of the sweep that satisfied the gate.
    pub sweep_index: Option<usize>,
    /// Index into the break list of the break that satisfied the gate.
    pub break_index: Option<usize>,
    pub used_fallback: bool,
    pub tier: Option<GateTier>,
}

impl SequenceGateResult {
    pub fn failed() -> Self {
        Self {
            passed: false,
            sweep_index: None,
            break_index: None,
            used_fallback: false,
            tier: None,
        }
    }

    fn pass(tier: GateTier, sweep_index: usize, break_index: usize) -> Self {
        Self {
            passed: true,
            sweep_index: Some(sweep_index),
            break_index: Some(break_index),
            used_fallback: tier != GateTier::Strict,
            tier: Some(tier),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SequenceGate {
    config: SequenceConfig,
    filter: SweepFilter,
}

impl SequenceGate {
    pub fn new(config: SequenceConfig, filter: SweepFilter) -> Self {
        Self { config, filter }
    }

    /// Gate with the configured lookback and fallback toggle.
    pub fn check(
        &self,
        direction: Direction,
        sweeps: &[StructureEvent],
        breaks: &[StructureEvent],
        series: &BarSeries,
    ) -> SequenceGateResult {
        self.validate(
            direction,
            sweeps,
            breaks,
            series,
            self.config.lookback_bars,
            self.config.allow_fallback,
        )
    }

    /// `sweeps` and `breaks` are chronological; ages are measured in bars of `series`.
    pub fn validate(
        &self,
        direction: Direction,
        sweeps: &[StructureEvent],
        breaks: &[StructureEvent],
        series: &BarSeries,
        lookback_bars: usize,
        allow_fallback: bool,
    ) -> SequenceGateResult {
        if series.is_empty() || sweeps.is_empty() || breaks.is_empty() || lookback_bars == 0 {
            return SequenceGateResult::failed();
        }

        let tiers: &[GateTier] = if allow_fallback {
            &[GateTier::Strict, GateTier::Extended]
        } else {
            &[GateTier::Strict]
        };
        for &tier in tiers {
            let window = lookback_bars * tier.window_multiple();
            if let Some(sweep_index) = self.newest_sweep_within(sweeps, series, window) {
                let sweep = &sweeps[sweep_index];
                if let Some(break_index) = break_after(breaks, sweep, Some(direction)) {
                    return SequenceGateResult::pass(tier, sweep_index, break_index);
                }
            }
        }

        if allow_fallback {
            let window = lookback_bars * GateTier::AnyDirection.window_multiple();
            if let Some(sweep_index) = self.newest_sweep_within(sweeps, series, window) {
                let sweep = &sweeps[sweep_index];
                // A directional break that was too old for the tiers above does
                // not get a second chance here.
                if break_after(breaks, sweep, Some(direction)).is_some() {
                    return SequenceGateResult::failed();
                }
                if let Some(break_index) = break_after(breaks, sweep, None) {
                    return SequenceGateResult::pass(GateTier::AnyDirection, sweep_index, break_index);
                }
            }
        }

        SequenceGateResult::failed()
    }

    fn newest_sweep_within(
        &self,
        sweeps: &[StructureEvent],
        series: &BarSeries,
        window: usize,
    ) -> Option<usize> {
        for (index, sweep) in sweeps.iter().enumerate().rev() {
            if !self.filter.accepts_event(sweep) {
                continue;
            }
            // Sweeps are chronological: once one is too old, all earlier ones are too.
            return match series.bars_since(sweep.time) {
                Some(age) if age <= window => Some(index),
                _ => None,
            };
        }
        None
    }
}

/// Newest break strictly after `sweep`, optionally restricted to `direction`.
fn break_after(
    breaks: &[StructureEvent],
    sweep: &StructureEvent,
    direction: Option<Direction>,
) -> Option<usize> {
    for (index, brk) in breaks.iter().enumerate().rev() {
        if brk.time <= sweep.time {
            break;
        }
        if direction.map_or(true, |d| brk.direction == d) {
            return Some(index);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, SweepLabel};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(bar: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + Duration::minutes(15 * bar)
    }

    fn series(len: i64) -> BarSeries {
        let bars = (0..len)
            .map(|i| Bar::new(t(i), 1.1, 1.1005, 1.0995, 1.1))
            .collect();
        BarSeries::from_bars(bars).unwrap()
    }

    fn sweep(bar: i64, label: SweepLabel) -> StructureEvent {
        StructureEvent::sweep(t(bar), Direction::Long, 1.0990, label)
    }

    fn brk(bar: i64, direction: Direction) -> StructureEvent {
        StructureEvent::structure_break(t(bar), direction, 1.1010)
    }

    fn gate() -> SequenceGate {
        SequenceGate::new(SequenceConfig::default(), SweepFilter::default())
    }

    #[test]
    fn strict_pass() {
        let s = series(100);
        let sweeps = [sweep(80, SweepLabel::PriorDayLow)];
        let breaks = [brk(90, Direction::Long)];
        let r = gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, true);
        assert!(r.passed);
        assert_eq!(r.tier, Some(GateTier::Strict));
        assert!(!r.used_fallback);
        assert_eq!((r.sweep_index, r.break_index), (Some(0), Some(0)));
    }

    #[test]
    fn break_eighty_bars_after_sweep_needs_fallback() {
        // sweep at bar 19, break at bar 99 (the current bar): sweep is 80 bars old
        let s = series(100);
        let sweeps = [sweep(19, SweepLabel::PriorDayLow)];
        let breaks = [brk(99, Direction::Long)];

        let strict = gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, false);
        assert!(!strict.passed);

        let extended = gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, true);
        assert!(extended.passed);
        assert_eq!(extended.tier, Some(GateTier::Extended));
        assert!(extended.used_fallback);
    }

    #[test]
    fn break_at_sweep_time_does_not_count() {
        let s = series(100);
        let sweeps = [sweep(90, SweepLabel::PriorDayLow)];
        let breaks = [brk(90, Direction::Long)];
        assert!(!gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, true).passed);
    }

    #[test]
    fn scan_stops_at_first_break_before_sweep() {
        let s = series(100);
        let sweeps = [sweep(80, SweepLabel::PriorDayLow)];
        // the only long break precedes the sweep; a short break follows it
        let breaks = [brk(70, Direction::Long), brk(85, Direction::Short)];
        let strict = gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, false);
        assert!(!strict.passed);

        let any = gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, true);
        assert!(any.passed);
        assert_eq!(any.tier, Some(GateTier::AnyDirection));
        assert_eq!(any.break_index, Some(1));
    }

    #[test]
    fn any_direction_window_is_four_lookbacks() {
        let s = series(300);
        let sweeps = [sweep(100, SweepLabel::PriorDayLow)];
        let breaks = [brk(110, Direction::Short)];
        // sweep 199 bars old: inside 4 x 50
        assert!(gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, true).passed);
        // 249 bars old: outside
        let s = series(350);
        assert!(!gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, true).passed);
    }

    #[test]
    fn stale_directional_break_blocks_any_direction_tier() {
        // sweep 149 bars old with a long break after it: too old for Extended,
        // and the break's existence rules out AnyDirection
        let s = series(300);
        let sweeps = [sweep(150, SweepLabel::PriorDayLow)];
        let breaks = [brk(160, Direction::Long)];
        let r = gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, true);
        assert!(!r.passed);
        assert_eq!(r.tier, None);

        let mixed = [brk(160, Direction::Long), brk(170, Direction::Short)];
        assert!(!gate().validate(Direction::Long, &sweeps, &mixed, &s, 50, true).passed);
    }

    #[test]
    fn filtered_label_is_skipped() {
        let s = series(100);
        let sweeps = [
            sweep(80, SweepLabel::PriorDayLow),
            sweep(95, SweepLabel::InternalSwing),
        ];
        let breaks = [brk(90, Direction::Long)];
        let r = gate().validate(Direction::Long, &sweeps, &breaks, &s, 50, false);
        assert!(r.passed);
        assert_eq!(r.sweep_index, Some(0));
    }

    #[test]
    fn empty_inputs_fail_closed() {
        let s = series(100);
        assert!(!gate().check(Direction::Long, &[], &[], &s).passed);
        assert!(!gate().check(Direction::Long, &[], &[], &BarSeries::new()).passed);
    }
}

//! Broker-compliance pipeline, run on the sized order at venue precision.
//!
//! Checks, in order:
//! 1. volume within `[min_volume, max_volume]`
//! 2. reward/risk recomputed from *rounded* entry, stop and target
//! 3. stop on the losing side and target on the winning side of the rounded entry

use serde::{Deserialize, Serialize};

use super::{GuardRejection, RejectionReason};
use crate::domain::{BrokerLimits, Direction, MarketSnapshot, TradeSignal};

/// Float slack when comparing a recomputed reward/risk against the minimum.
const RR_TOLERANCE: f64 = 1e-9;

/// Signal levels rounded to the venue's price digits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundedLevels {
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub risk_reward: f64,
}

impl RoundedLevels {
    pub fn stop_distance(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    pub fn target_distance(&self) -> f64 {
        (self.target - self.entry).abs()
    }
}

pub fn check_compliance(
    signal: &TradeSignal,
    volume: f64,
    snapshot: &MarketSnapshot,
    limits: &BrokerLimits,
    min_risk_reward: f64,
) -> Result<RoundedLevels, GuardRejection> {
    if !limits.within_bounds(volume) {
        return Err(GuardRejection::new(
            RejectionReason::VolumeOutOfBounds,
            format!(
                "volume={volume}, bounds=[{}, {}]",
                limits.min_volume, limits.max_volume
            ),
        ));
    }

    let entry = snapshot.round_price(signal.entry_price);
    let stop = snapshot.round_price(signal.stop_loss);
    let target = snapshot.round_price(signal.take_profit);

    let risk = (entry - stop).abs();
    let reward = (target - entry).abs();
    let risk_reward = if risk > 0.0 { reward / risk } else { 0.0 };
    if risk_reward + RR_TOLERANCE < min_risk_reward {
        return Err(GuardRejection::new(
            RejectionReason::RiskRewardTooLow,
            format!("rr={risk_reward:.3}, min={min_risk_reward:.2}"),
        ));
    }

    let direction = signal.direction;
    if !direction.is_better_stop(entry, stop) {
        return Err(GuardRejection::new(
            RejectionReason::InvalidStopSide,
            format!("{direction} entry={entry}, stop={stop}"),
        ));
    }
    if !target_on_winning_side(direction, entry, target) {
        return Err(GuardRejection::new(
            RejectionReason::InvalidTargetSide,
            format!("{direction} entry={entry}, target={target}"),
        ));
    }

    Ok(RoundedLevels {
        entry,
        stop,
        target,
        risk_reward,
    })
}

fn target_on_winning_side(direction: Direction, entry: f64, target: f64) -> bool {
    direction.favorable_move(entry, target) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot::from_quotes(
            Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap(),
            1.09990,
            1.10000,
            0.0001,
            5,
        )
    }

    fn signal(direction: Direction, entry: f64, stop: f64, target: f64) -> TradeSignal {
        TradeSignal {
            direction,
            entry_price: entry,
            stop_loss: stop,
            take_profit: target,
            confidence: 0.8,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn rounded_rr_below_minimum_rejects() {
        // stop rounds to 15 pips, target to 11 pips: rr 0.733
        let s = signal(Direction::Long, 1.100001, 1.098502, 1.101098);
        let err = check_compliance(&s, 0.1, &snapshot(), &BrokerLimits::default(), 0.75)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::RiskRewardTooLow);
        assert!(err.context.starts_with("rr=0.733"));
    }

    #[test]
    fn rr_exactly_at_minimum_passes_despite_float_noise() {
        // 16 pips each side; the float quotient lands just under 1.0
        let s = signal(Direction::Long, 1.09000, 1.08840, 1.09160);
        let levels =
            check_compliance(&s, 0.1, &snapshot(), &BrokerLimits::default(), 1.0).unwrap();
        assert!((levels.risk_reward - 1.0).abs() < 1e-9);
    }

    #[test]
    fn volume_out_of_bounds_rejects_first() {
        let s = signal(Direction::Long, 1.1, 1.0985, 1.0996);
        let err = check_compliance(&s, 0.001, &snapshot(), &BrokerLimits::default(), 0.75)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::VolumeOutOfBounds);
        let err = check_compliance(&s, 500.0, &snapshot(), &BrokerLimits::default(), 0.75)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::VolumeOutOfBounds);
    }

    #[test]
    fn stop_on_winning_side_rejects() {
        let s = signal(Direction::Long, 1.1, 1.1020, 1.1060);
        let err =
            check_compliance(&s, 0.1, &snapshot(), &BrokerLimits::default(), 1.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::InvalidStopSide);
    }

    #[test]
    fn target_on_losing_side_rejects() {
        let s = signal(Direction::Short, 1.1, 1.1020, 1.1050);
        let err =
            check_compliance(&s, 0.1, &snapshot(), &BrokerLimits::default(), 1.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::InvalidTargetSide);
    }

    #[test]
    fn valid_short_passes_with_rounded_levels() {
        let s = signal(Direction::Short, 1.0999049, 1.1014, 1.0969);
        let levels =
            check_compliance(&s, 0.1, &snapshot(), &BrokerLimits::default(), 1.0).unwrap();
        assert_eq!(levels.entry, 1.0999);
        assert!((levels.risk_reward - 2.0).abs() < 1e-6);
    }
}

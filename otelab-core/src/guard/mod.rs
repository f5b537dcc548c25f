//! Pre-trade execution guard.
//!
//! Two ordered gates run immediately before submission:
//! 1. spread/volatility veto (`spread`), which may also halve the size
//! 2. broker compliance (`compliance`) on the sized, rounded order
//!
//! Any failure aborts the submission; nothing partial is produced.

pub mod compliance;
pub mod spread;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::{GuardConfig, RiskConfig};
use crate::domain::{AccountState, BrokerLimits, MarketSnapshot, OrderRequest, TradeSignal};
use crate::indicators::VolatilityReading;
use crate::sizing::{PositionSizer, SizedVolume, SizingInput};

pub use compliance::{check_compliance, RoundedLevels};
pub use spread::{assess_spread, SpreadVerdict};

/// Why an order was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    SpreadTooWide,
    /// ATR is zero or unknown, so the spread ratio is undefined.
    InsufficientVolatility,
    VolumeOutOfBounds,
    ZeroVolume,
    RiskRewardTooLow,
    InvalidStopSide,
    InvalidTargetSide,
    AdvisoryBlock,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::SpreadTooWide => write!(f, "SpreadTooWide"),
            RejectionReason::InsufficientVolatility => write!(f, "InsufficientVolatility"),
            RejectionReason::VolumeOutOfBounds => write!(f, "VolumeOutOfBounds"),
            RejectionReason::ZeroVolume => write!(f, "ZeroVolume"),
            RejectionReason::RiskRewardTooLow => write!(f, "RiskRewardTooLow"),
            RejectionReason::InvalidStopSide => write!(f, "InvalidStopSide"),
            RejectionReason::InvalidTargetSide => write!(f, "InvalidTargetSide"),
            RejectionReason::AdvisoryBlock => write!(f, "AdvisoryBlock"),
        }
    }
}

/// A rejection with the numbers that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRejection {
    pub reason: RejectionReason,
    pub context: String,
}

impl GuardRejection {
    pub fn new(reason: RejectionReason, context: impl Into<String>) -> Self {
        Self {
            reason,
            context: context.into(),
        }
    }
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.context)
    }
}

/// An order that passed both gates.
#[derive(Debug, Clone, PartialEq)]
pub struct VettedOrder {
    pub request: OrderRequest,
    pub levels: RoundedLevels,
    pub sizing: SizedVolume,
    pub spread: SpreadVerdict,
}

#[derive(Debug, Clone)]
pub struct ExecutionGuard {
    config: GuardConfig,
    min_risk_reward: f64,
    limits: BrokerLimits,
    sizer: PositionSizer,
}

impl ExecutionGuard {
    pub fn new(config: GuardConfig, risk: RiskConfig, limits: BrokerLimits) -> Self {
        Self {
            config,
            min_risk_reward: risk.min_risk_reward,
            sizer: PositionSizer::new(risk, limits.clone()),
            limits,
        }
    }

    /// Run both gates over `signal` and produce the order to submit.
    pub fn vet(
        &self,
        signal: &TradeSignal,
        snapshot: &MarketSnapshot,
        account: &AccountState,
        volatility: &VolatilityReading,
        advisory_multiplier: f64,
        label: &str,
    ) -> Result<VettedOrder, GuardRejection> {
        let spread = assess_spread(snapshot.spread, volatility.atr, &self.config)?;

        let sizing = self.sizer.size(&SizingInput {
            account: account.clone(),
            stop_pips: snapshot.to_pips(signal.stop_distance()),
            pip_size: snapshot.pip_size,
            price: signal.entry_price,
            spread_multiplier: spread.size_multiplier(),
            advisory_multiplier,
        });
        if sizing.volume <= 0.0 {
            return Err(GuardRejection::new(
                RejectionReason::ZeroVolume,
                format!(
                    "equity={:.2}, stop_distance={:.5}",
                    account.equity,
                    signal.stop_distance()
                ),
            ));
        }

        let levels = check_compliance(
            signal,
            sizing.volume,
            snapshot,
            &self.limits,
            self.min_risk_reward,
        )?;

        debug!(
            direction = %signal.direction,
            volume = sizing.volume,
            risk_volume = sizing.risk_volume,
            rr = levels.risk_reward,
            spread_ratio = spread.ratio(),
            "Order passed execution guard"
        );

        let request = OrderRequest {
            direction: signal.direction,
            volume: sizing.volume,
            stop_distance: levels.stop_distance(),
            target_distance: levels.target_distance(),
            label: label.to_string(),
            expected_entry: levels.entry,
        };
        Ok(VettedOrder {
            request,
            levels,
            sizing,
            spread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::indicators::{VolatilityMode, VolatilityRegime};
    use chrono::{TimeZone, Utc};

    fn snapshot(spread_pips: f64) -> MarketSnapshot {
        MarketSnapshot::from_quotes(
            Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap(),
            1.10000,
            1.10000 + spread_pips * 0.0001,
            0.0001,
            5,
        )
    }

    fn reading(atr: f64) -> VolatilityReading {
        VolatilityReading {
            atr,
            z_score: 0.0,
            regime: VolatilityRegime::Normal,
            multiplier: 1.5,
            mode: VolatilityMode::ZScore,
        }
    }

    fn account() -> AccountState {
        AccountState {
            equity: 10_000.0,
            free_margin: 10_000.0,
            leverage: 100.0,
        }
    }

    fn long_signal(entry: f64) -> TradeSignal {
        TradeSignal {
            direction: Direction::Long,
            entry_price: entry,
            stop_loss: entry - 0.0020,
            take_profit: entry + 0.0040,
            confidence: 0.8,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap(),
        }
    }

    fn guard() -> ExecutionGuard {
        ExecutionGuard::new(
            GuardConfig::default(),
            RiskConfig::default(),
            BrokerLimits::default(),
        )
    }

    #[test]
    fn full_size_order_passes() {
        let snap = snapshot(1.0);
        let vetted = guard()
            .vet(&long_signal(snap.ask), &snap, &account(), &reading(0.0010), 1.0, "ote")
            .unwrap();
        // 100 / (20 pips * 10) = 0.5 lots
        assert_eq!(vetted.request.volume, 0.5);
        assert_eq!(vetted.request.label, "ote");
        assert!((vetted.request.stop_distance - 0.0020).abs() < 1e-9);
        assert!((vetted.request.target_distance - 0.0040).abs() < 1e-9);
        assert!(matches!(vetted.spread, SpreadVerdict::Full { .. }));
    }

    #[test]
    fn wide_spread_rejects_before_sizing() {
        let snap = snapshot(4.5);
        let err = guard()
            .vet(&long_signal(snap.ask), &snap, &account(), &reading(0.0010), 1.0, "ote")
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::SpreadTooWide);
    }

    #[test]
    fn moderate_spread_halves_size() {
        let snap = snapshot(3.0);
        let vetted = guard()
            .vet(&long_signal(snap.ask), &snap, &account(), &reading(0.0010), 1.0, "ote")
            .unwrap();
        assert_eq!(vetted.request.volume, 0.25);
    }

    #[test]
    fn rejection_display_includes_context() {
        let r = GuardRejection::new(RejectionReason::RiskRewardTooLow, "rr=0.73, min=0.75");
        assert_eq!(r.to_string(), "RiskRewardTooLow (rr=0.73, min=0.75)");
    }
}

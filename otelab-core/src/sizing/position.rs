//! Risk-based position sizing.
//!
//! ```text
//! volume = equity * risk_percent / 100 / (stop_pips * pip_value_per_lot)
//! ```
//!
//! followed by a chain of shrink-only scalers (spread, margin cap, notional cap,
//! advisory). Each scaler may only reduce the volume and re-floors it to the broker
//! minimum. The result is rounded down to the volume step last.

use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::domain::{AccountState, BrokerLimits};

/// One shrink step that changed the volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizeAdjustment {
    Spread { multiplier: f64 },
    MarginCap { cap: f64 },
    NotionalCap { cap: f64 },
    Advisory { multiplier: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingInput {
    pub account: AccountState,
    pub stop_pips: f64,
    pub pip_size: f64,
    /// Price used for margin and notional (the expected entry).
    pub price: f64,
    pub spread_multiplier: f64,
    pub advisory_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedVolume {
    /// Final volume, rounded down to the step.
    pub volume: f64,
    /// Pure risk volume before any scaler.
    pub risk_volume: f64,
    pub adjustments: Vec<SizeAdjustment>,
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk: RiskConfig,
    limits: BrokerLimits,
}

impl PositionSizer {
    pub fn new(risk: RiskConfig, limits: BrokerLimits) -> Self {
        Self { risk, limits }
    }

    /// Volume that loses `risk_percent` of equity when the stop is hit.
    ///
    /// Zero when equity or the stop is non-positive.
    pub fn risk_volume(&self, equity: f64, stop_pips: f64, pip_size: f64) -> f64 {
        let pip_value = self.limits.pip_value_per_lot(pip_size);
        if equity <= 0.0 || stop_pips <= 0.0 || pip_value <= 0.0 {
            return 0.0;
        }
        equity * self.risk.risk_percent / 100.0 / (stop_pips * pip_value)
    }

    pub fn size(&self, input: &SizingInput) -> SizedVolume {
        let risk_volume = self.risk_volume(input.account.equity, input.stop_pips, input.pip_size);
        if risk_volume <= 0.0 {
            return SizedVolume {
                volume: 0.0,
                risk_volume,
                adjustments: Vec::new(),
            };
        }

        let mut volume = self.limits.floor_to_min(risk_volume);
        let mut adjustments = Vec::new();

        if input.spread_multiplier < 1.0 {
            volume = self.shrink(volume, volume * input.spread_multiplier);
            adjustments.push(SizeAdjustment::Spread {
                multiplier: input.spread_multiplier,
            });
        }

        let per_lot_notional = self.limits.contract_size * input.price;
        if per_lot_notional > 0.0 {
            let leverage = input.account.leverage.max(1.0);
            let margin_cap = input.account.free_margin.max(0.0)
                * self.risk.max_margin_utilization
                * leverage
                / per_lot_notional;
            if volume > margin_cap {
                volume = self.shrink(volume, margin_cap);
                adjustments.push(SizeAdjustment::MarginCap { cap: margin_cap });
            }

            let notional_cap =
                input.account.equity * self.risk.max_notional_multiple / per_lot_notional;
            if volume > notional_cap {
                volume = self.shrink(volume, notional_cap);
                adjustments.push(SizeAdjustment::NotionalCap { cap: notional_cap });
            }
        }

        if input.advisory_multiplier < 1.0 {
            let multiplier = input.advisory_multiplier.max(0.0);
            volume = self.shrink(volume, volume * multiplier);
            adjustments.push(SizeAdjustment::Advisory { multiplier });
        }

        SizedVolume {
            volume: self.limits.round_volume_down(volume),
            risk_volume,
            adjustments,
        }
    }

    fn shrink(&self, current: f64, candidate: f64) -> f64 {
        self.limits.floor_to_min(current.min(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer() -> PositionSizer {
        PositionSizer::new(RiskConfig::default(), BrokerLimits::default())
    }

    fn input(equity: f64, stop_pips: f64) -> SizingInput {
        SizingInput {
            account: AccountState {
                equity,
                free_margin: equity,
                leverage: 100.0,
            },
            stop_pips,
            pip_size: 0.0001,
            price: 1.1,
            spread_multiplier: 1.0,
            advisory_multiplier: 1.0,
        }
    }

    #[test]
    fn risk_volume_formula() {
        // 10_000 * 1% = 100; 20 pips * $10/pip/lot = 200 per lot
        let v = sizer().risk_volume(10_000.0, 20.0, 0.0001);
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unscaled_size_is_rounded_risk_volume() {
        let sized = sizer().size(&input(10_000.0, 30.0));
        // 100 / 300 = 0.3333 -> 0.33
        assert_eq!(sized.volume, 0.33);
        assert!(sized.adjustments.is_empty());
    }

    #[test]
    fn spread_halving_refloors_to_minimum() {
        let mut inp = input(200.0, 20.0);
        inp.spread_multiplier = 0.5;
        // risk volume 0.01 -> halved 0.005 -> refloored 0.01
        let sized = sizer().size(&inp);
        assert_eq!(sized.volume, 0.01);
        assert_eq!(sized.adjustments, vec![SizeAdjustment::Spread { multiplier: 0.5 }]);
    }

    #[test]
    fn margin_cap_shrinks_but_never_grows() {
        let mut inp = input(100_000.0, 10.0);
        inp.account.free_margin = 1_000.0;
        // risk volume 10 lots; margin cap 1000 * 0.5 * 100 / 110_000 = 0.4545
        let sized = sizer().size(&inp);
        assert_eq!(sized.volume, 0.45);
        assert!(matches!(sized.adjustments[0], SizeAdjustment::MarginCap { .. }));
    }

    #[test]
    fn notional_cap_applies() {
        let mut inp = input(10_000.0, 1.0);
        inp.account.leverage = 1_000.0;
        // risk volume 10 lots = 1.1M notional > 10x equity (100k) -> 0.909 lots
        let sized = sizer().size(&inp);
        assert_eq!(sized.volume, 0.9);
        assert!(sized
            .adjustments
            .iter()
            .any(|a| matches!(a, SizeAdjustment::NotionalCap { .. })));
    }

    #[test]
    fn advisory_multiplier_scales_down() {
        let mut inp = input(10_000.0, 20.0);
        inp.advisory_multiplier = 0.5;
        assert_eq!(sizer().size(&inp).volume, 0.25);
    }

    #[test]
    fn no_equity_means_no_volume() {
        let sized = sizer().size(&input(0.0, 20.0));
        assert_eq!(sized.volume, 0.0);
    }
}

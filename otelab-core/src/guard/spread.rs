//! Spread/volatility veto.
//!
//! `ratio = spread / atr`:
//! - ratio >= reject_ratio (0.40): reject
//! - ratio >= reduce_ratio (0.25): trade at `reduced_size_multiplier` (0.5)
//! - otherwise full size
//!
//! An ATR of zero makes the ratio undefined and fails closed.

use serde::{Deserialize, Serialize};

use super::{GuardRejection, RejectionReason};
use crate::config::GuardConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SpreadVerdict {
    Full { ratio: f64 },
    Reduced { ratio: f64, multiplier: f64 },
}

impl SpreadVerdict {
    pub fn ratio(&self) -> f64 {
        match *self {
            SpreadVerdict::Full { ratio } | SpreadVerdict::Reduced { ratio, .. } => ratio,
        }
    }

    pub fn size_multiplier(&self) -> f64 {
        match *self {
            SpreadVerdict::Full { .. } => 1.0,
            SpreadVerdict::Reduced { multiplier, .. } => multiplier,
        }
    }
}

/// Both arguments in price units.
pub fn assess_spread(
    spread: f64,
    atr: f64,
    config: &GuardConfig,
) -> Result<SpreadVerdict, GuardRejection> {
    if atr.is_nan() || atr <= 0.0 || atr.is_infinite() {
        return Err(GuardRejection::new(
            RejectionReason::InsufficientVolatility,
            format!("atr={atr}"),
        ));
    }
    let ratio = spread.max(0.0) / atr;
    // Tolerate float noise at the exact threshold (e.g. 4.0 pips / 10 pips).
    let at_least = |threshold: f64| ratio >= threshold - 1e-9;

    if at_least(config.reject_ratio) {
        Err(GuardRejection::new(
            RejectionReason::SpreadTooWide,
            format!("ratio={ratio:.3}, max={:.2}", config.reject_ratio),
        ))
    } else if at_least(config.reduce_ratio) {
        Ok(SpreadVerdict::Reduced {
            ratio,
            multiplier: config.reduced_size_multiplier,
        })
    } else {
        Ok(SpreadVerdict::Full { ratio })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIP: f64 = 0.0001;

    #[test]
    fn veto_at_045() {
        let err = assess_spread(4.5 * PIP, 10.0 * PIP, &GuardConfig::default()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::SpreadTooWide);
    }

    #[test]
    fn veto_exactly_at_threshold() {
        let err = assess_spread(4.0 * PIP, 10.0 * PIP, &GuardConfig::default()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::SpreadTooWide);
    }

    #[test]
    fn half_size_at_030() {
        let verdict = assess_spread(3.0 * PIP, 10.0 * PIP, &GuardConfig::default()).unwrap();
        assert_eq!(verdict.size_multiplier(), 0.5);
        assert!((verdict.ratio() - 0.30).abs() < 1e-9);
    }

    #[test]
    fn full_size_below_025() {
        let verdict = assess_spread(1.0 * PIP, 10.0 * PIP, &GuardConfig::default()).unwrap();
        assert_eq!(verdict.size_multiplier(), 1.0);
    }

    #[test]
    fn zero_atr_fails_closed() {
        let err = assess_spread(1.0 * PIP, 0.0, &GuardConfig::default()).unwrap_err();
        assert_eq!(err.reason, RejectionReason::InsufficientVolatility);
    }
}

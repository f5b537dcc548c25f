//! Adaptive stop-loss sizer.
//!
//! ```text
//! sl_pips = max(raw_pips, floor_pips, atr_pips * multiplier)
//! sl_pips = clamp(sl_pips, min_abs_pips, max_abs_pips)
//! ```
//!
//! A clamp is reported on the result and logged; it never fails sizing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StopSizerConfig;
use crate::domain::{Direction, MarketSnapshot};
use crate::error::ConfigError;
use crate::indicators::VolatilityReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampBound {
    Min,
    Max,
}

/// The safety band overrode the volatility-derived distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampEvent {
    pub bound: ClampBound,
    pub unclamped_pips: f64,
    pub clamped_pips: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopDistance {
    pub pips: f64,
    /// `pips` in price units (always positive).
    pub price_offset: f64,
    pub clamp: Option<ClampEvent>,
}

impl StopDistance {
    /// Stop price for an entry at `entry` in `direction`.
    pub fn stop_price(&self, direction: Direction, entry: f64) -> f64 {
        direction.retreat(entry, self.price_offset)
    }
}

#[derive(Debug, Clone)]
pub struct StopLossSizer {
    config: StopSizerConfig,
}

impl StopLossSizer {
    pub fn new(config: StopSizerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Size the stop for a raw distance given in price units.
    pub fn size(
        &self,
        raw_distance: f64,
        volatility: &VolatilityReading,
        snapshot: &MarketSnapshot,
    ) -> StopDistance {
        let raw_pips = snapshot.to_pips(raw_distance.abs());
        let atr_pips = snapshot.to_pips(volatility.atr);
        let pips = self.size_pips(raw_pips, atr_pips * volatility.multiplier);
        StopDistance {
            pips: pips.0,
            price_offset: snapshot.from_pips(pips.0),
            clamp: pips.1,
        }
    }

    /// Core rule in pip space: returns the final distance and any clamp.
    pub fn size_pips(&self, raw_pips: f64, atr_min_pips: f64) -> (f64, Option<ClampEvent>) {
        let unclamped = raw_pips.max(self.config.floor_pips).max(atr_min_pips);

        let clamp = if unclamped < self.config.min_abs_pips {
            Some(ClampEvent {
                bound: ClampBound::Min,
                unclamped_pips: unclamped,
                clamped_pips: self.config.min_abs_pips,
            })
        } else if unclamped > self.config.max_abs_pips {
            Some(ClampEvent {
                bound: ClampBound::Max,
                unclamped_pips: unclamped,
                clamped_pips: self.config.max_abs_pips,
            })
        } else {
            None
        };

        match clamp {
            Some(event) => {
                debug!(
                    bound = ?event.bound,
                    unclamped_pips = event.unclamped_pips,
                    clamped_pips = event.clamped_pips,
                    "Stop distance clamped to safety band"
                );
                (event.clamped_pips, Some(event))
            }
            None => (unclamped, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{VolatilityMode, VolatilityRegime};
    use chrono::{TimeZone, Utc};

    fn sizer() -> StopLossSizer {
        StopLossSizer::new(StopSizerConfig {
            floor_pips: 5.0,
            min_abs_pips: 15.0,
            max_abs_pips: 50.0,
        })
        .unwrap()
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot::from_quotes(
            Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap(),
            1.10000,
            1.10010,
            0.0001,
            5,
        )
    }

    #[test]
    fn atr_floor_then_min_clamp() {
        // raw 8, floor 5, ATR 10 x 1.2 = 12, clamped up to 15
        let (pips, clamp) = sizer().size_pips(8.0, 10.0 * 1.2);
        assert!((pips - 15.0).abs() < 1e-9);
        let clamp = clamp.unwrap();
        assert_eq!(clamp.bound, ClampBound::Min);
        assert!((clamp.unclamped_pips - 12.0).abs() < 1e-9);
    }

    #[test]
    fn within_band_is_untouched() {
        let (pips, clamp) = sizer().size_pips(22.0, 18.0);
        assert_eq!(pips, 22.0);
        assert!(clamp.is_none());
    }

    #[test]
    fn wide_stop_clamped_to_max() {
        let (pips, clamp) = sizer().size_pips(80.0, 10.0);
        assert_eq!(pips, 50.0);
        assert_eq!(clamp.unwrap().bound, ClampBound::Max);
    }

    #[test]
    fn inverted_band_is_a_config_error() {
        let err = StopLossSizer::new(StopSizerConfig {
            floor_pips: 5.0,
            min_abs_pips: 40.0,
            max_abs_pips: 20.0,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "stop_sizer.max_abs_pips", .. }
        ));
    }

    #[test]
    fn size_converts_price_units() {
        let reading = VolatilityReading {
            atr: 0.0015,
            z_score: 0.0,
            regime: VolatilityRegime::Normal,
            multiplier: 1.5,
            mode: VolatilityMode::ZScore,
        };
        // raw 20 pips, ATR 15 pips x 1.5 = 22.5 pips
        let stop = sizer().size(0.0020, &reading, &snapshot());
        assert!((stop.pips - 22.5).abs() < 1e-6);
        assert!((stop.price_offset - 0.00225).abs() < 1e-9);
        assert!(stop.clamp.is_none());
        assert!((stop.stop_price(Direction::Long, 1.1) - 1.09775).abs() < 1e-9);
        assert!((stop.stop_price(Direction::Short, 1.1) - 1.10225).abs() < 1e-9);
    }
}

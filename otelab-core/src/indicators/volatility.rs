//! Volatility classifier: 10-bar ATR plus a z-score of that ATR against its own
//! trailing 20-sample window.
//!
//! History bands:
//! - fewer than 12 bars: ATR is 0 and the reading is `Insufficient`
//! - 12..30 bars: plain ATR, no z-score, normal multiplier
//! - 30+ bars: z-score over the last 20 ATR values of the last 30 bars

use serde::{Deserialize, Serialize};

use super::{Atr, Indicator};
use crate::config::VolatilityConfig;
use crate::domain::Bar;
use crate::error::ConfigError;

pub const ATR_PERIOD: usize = 10;
pub const ZSCORE_WINDOW: usize = 20;
pub const FULL_HISTORY_BARS: usize = 30;
pub const MIN_HISTORY_BARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

/// How much history backed the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityMode {
    Insufficient,
    PlainAtr,
    ZScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityReading {
    /// Current ATR in price units.
    pub atr: f64,
    pub z_score: f64,
    pub regime: VolatilityRegime,
    /// Multiplier the stop sizer applies to `atr`.
    pub multiplier: f64,
    pub mode: VolatilityMode,
}

impl VolatilityReading {
    pub fn is_usable(&self) -> bool {
        self.mode != VolatilityMode::Insufficient && self.atr > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct VolatilityClassifier {
    config: VolatilityConfig,
    atr: Atr,
}

impl VolatilityClassifier {
    pub fn new(config: VolatilityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            atr: Atr::new(ATR_PERIOD)?,
        })
    }

    /// Classify the most recent closed bars of `bars`.
    pub fn classify(&self, bars: &[Bar]) -> VolatilityReading {
        if bars.len() < MIN_HISTORY_BARS {
            return VolatilityReading {
                atr: 0.0,
                z_score: 0.0,
                regime: VolatilityRegime::Normal,
                multiplier: self.config.normal_multiplier,
                mode: VolatilityMode::Insufficient,
            };
        }

        let tail = &bars[bars.len().saturating_sub(FULL_HISTORY_BARS)..];
        let series = self.atr.compute(tail);
        let Some(current) = super::last_valid(&series) else {
            return VolatilityReading {
                atr: 0.0,
                z_score: 0.0,
                regime: VolatilityRegime::Normal,
                multiplier: self.config.normal_multiplier,
                mode: VolatilityMode::Insufficient,
            };
        };

        if tail.len() < FULL_HISTORY_BARS {
            return VolatilityReading {
                atr: current,
                z_score: 0.0,
                regime: VolatilityRegime::Normal,
                multiplier: self.config.normal_multiplier,
                mode: VolatilityMode::PlainAtr,
            };
        }

        let samples: Vec<f64> = series
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .rev()
            .take(ZSCORE_WINDOW)
            .collect();
        let z_score = z_score(current, &samples);
        let (regime, multiplier) = self.bucket(z_score);

        VolatilityReading {
            atr: current,
            z_score,
            regime,
            multiplier,
            mode: VolatilityMode::ZScore,
        }
    }

    fn bucket(&self, z: f64) -> (VolatilityRegime, f64) {
        if z <= self.config.low_z {
            (VolatilityRegime::Low, self.config.low_multiplier)
        } else if z >= self.config.high_z {
            (VolatilityRegime::High, self.config.high_multiplier)
        } else {
            (VolatilityRegime::Normal, self.config.normal_multiplier)
        }
    }
}

/// Population z-score of `value` against `samples`; 0 when the spread is 0.
///
/// A spread within float noise of the mean counts as 0, otherwise a constant
/// series would produce z = +/-1 from rounding alone.
fn z_score(value: f64, samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sd = variance.sqrt();
    if sd <= mean.abs() * 1e-9 || !sd.is_finite() {
        0.0
    } else {
        (value - mean) / sd
    }
}

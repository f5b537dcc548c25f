//! Relative Strength Index (RSI), Wilder-smoothed.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). Lookback: period.
//! Edge cases: avg_loss == 0 gives 100, avg_gain == 0 gives 0, no movement gives 50.

use super::{checked_period, Indicator};
use crate::domain::Bar;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            period: checked_period("rsi.period", period)?,
        })
    }
}

impl Indicator for Rsi {
    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        wilder_rsi(&closes, self.period)
    }
}

/// RSI over a close series. The first valid value sits at index `period`.
pub fn wilder_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period + 1 {
        return result;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let seed = &changes[..period];
    if seed.iter().any(|c| c.is_nan()) {
        return result;
    }

    let mut avg_gain = seed.iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;
    result[period] = rsi_value(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for (offset, &change) in changes[period..].iter().enumerate() {
        if change.is_nan() {
            // Once smoothing state is poisoned it never recovers.
            break;
        }
        avg_gain = alpha * change.max(0.0) + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * (-change).max(0.0) + (1.0 - alpha) * avg_loss;
        result[period + 1 + offset] = rsi_value(avg_gain, avg_loss);
    }
    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

//! Close-to-close momentum and the Kaufman efficiency ratio.
//!
//! momentum[t] = close[t] - close[t-period]
//! efficiency  = (close[t] - close[t-window]) / sum |close[i] - close[i-1]|
//!
//! The efficiency ratio is signed here: +1 is a clean rise, -1 a clean fall,
//! values near 0 are chop.

use super::{checked_period, Indicator};
use crate::domain::Bar;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Momentum {
    period: usize,
}

impl Momentum {
    pub fn new(period: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            period: checked_period("momentum.period", period)?,
        })
    }
}

impl Indicator for Momentum {
    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            result[i] = bars[i].close - bars[i - self.period].close;
        }
        result
    }
}

/// Signed efficiency ratio over the last `window` bar-to-bar moves.
///
/// `None` without `window + 1` bars. A window with no movement at all is 0.
pub fn efficiency_ratio(bars: &[Bar], window: usize) -> Option<f64> {
    if window == 0 || bars.len() < window + 1 {
        return None;
    }
    let tail = &bars[bars.len() - window - 1..];
    let net = tail[window].close - tail[0].close;
    let path: f64 = tail.windows(2).map(|w| (w[1].close - w[0].close).abs()).sum();
    if path <= 0.0 || !path.is_finite() {
        return Some(0.0);
    }
    Some(net / path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn momentum_basic() {
        let bars = make_bars(&[100.0, 110.0, 105.0, 115.0]);
        let result = Momentum::new(2).unwrap().compute(&bars);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 5.0, DEFAULT_EPSILON);
        assert_approx(result[3], 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn efficiency_of_clean_trend_is_one() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_approx(efficiency_ratio(&bars, 4).unwrap(), 1.0, DEFAULT_EPSILON);
        let falling = make_bars(&[5.0, 4.0, 3.0]);
        assert_approx(efficiency_ratio(&falling, 2).unwrap(), -1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn efficiency_of_chop_is_small() {
        // net +1, path 1+1+1+1+1 = 5
        let bars = make_bars(&[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        assert_approx(efficiency_ratio(&bars, 5).unwrap(), 0.2, DEFAULT_EPSILON);
    }

    #[test]
    fn efficiency_needs_history() {
        let bars = make_bars(&[1.0, 2.0]);
        assert_eq!(efficiency_ratio(&bars, 2), None);
        assert_eq!(efficiency_ratio(&make_bars(&[3.0; 4]), 3), Some(0.0));
    }
}

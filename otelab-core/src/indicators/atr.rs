//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is the simple mean of the last `period` true ranges. TR[0] has no previous
//! close and is excluded, so the first valid ATR sits at index `period`.

use super::{checked_period, Indicator};
use crate::domain::Bar;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            period: checked_period("atr.period", period)?,
        })
    }

    /// Most recent ATR of `bars`, or `None` during warmup.
    pub fn latest(&self, bars: &[Bar]) -> Option<f64> {
        if bars.len() <= self.period {
            return None;
        }
        let start = bars.len() - self.period - 1;
        super::last_valid(&self.compute(&bars[start..]))
    }
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            tr.push(bar.high - bar.low);
            continue;
        }
        let pc = bars[i - 1].close;
        if bar.high.is_nan() || bar.low.is_nan() || pc.is_nan() {
            tr.push(f64::NAN);
        } else {
            tr.push(
                (bar.high - bar.low)
                    .max((bar.high - pc).abs())
                    .max((bar.low - pc).abs()),
            );
        }
    }
    tr
}

impl Indicator for Atr {
    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        let tr = true_range(bars);

        // Rolling sum over TR[i-period+1..=i]; a NaN inside the window poisons it.
        for i in self.period..n {
            let window = &tr[i + 1 - self.period..=i];
            if window.iter().any(|v| v.is_nan()) {
                continue;
            }
            result[i] = window.iter().sum::<f64>() / self.period as f64;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (1.1000, 1.1050, 1.0950, 1.1020), // TR = 0.0100
            (1.1020, 1.1080, 1.1000, 1.1060), // TR = max(0.0080, 0.0060, 0.0020)
            (1.1060, 1.1070, 1.0980, 1.0990), // TR = max(0.0090, 0.0010, 0.0080)
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 0.0100, 1e-9);
        assert_approx(tr[1], 0.0080, 1e-9);
        assert_approx(tr[2], 0.0090, 1e-9);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, |115-100|, |108-100|) = 15
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10 (excluded)
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
            (101.0, 106.0, 100.0, 105.0), // TR = 6
        ]);
        let result = Atr::new(3).unwrap().compute(&bars);
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 21.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn latest_needs_period_plus_one_bars() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
        ]);
        assert_eq!(Atr::new(3).unwrap().latest(&bars), None);
        assert_approx(Atr::new(2).unwrap().latest(&bars).unwrap(), 8.5, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_nan_poisons_its_window_only() {
        let mut bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 103.0, 97.0, 101.0),
            (101.0, 106.0, 100.0, 105.0),
        ]);
        bars[2].high = f64::NAN;
        let result = Atr::new(2).unwrap().compute(&bars);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
        assert!(!result[4].is_nan());
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(10).unwrap().lookback(), 10);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(matches!(
            Atr::new(0),
            Err(ConfigError::Invalid { field: "atr.period", .. })
        ));
    }
}

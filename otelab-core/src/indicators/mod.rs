//! Indicators used by the stop sizer, the spread guard and the exit strategies.
//!
//! Series indicators implement `Indicator`: bar history in, a series of the same
//! length out, `f64::NAN` during warmup. The volatility classifier and the
//! divergence detector are reads over those series rather than series themselves.

pub mod atr;
pub mod divergence;
pub mod momentum;
pub mod rsi;
pub mod volatility;

pub use atr::{true_range, Atr};
pub use divergence::{detect_divergence, DivergenceKind};
pub use momentum::{efficiency_ratio, Momentum};
pub use rsi::Rsi;
pub use volatility::{VolatilityClassifier, VolatilityMode, VolatilityReading, VolatilityRegime};

use crate::config::invalid;
use crate::domain::Bar;
use crate::error::ConfigError;

/// Trait for series indicators.
///
/// No value at bar t may depend on bars after t; the truncated-vs-full property
/// test enforces this for every implementation.
pub trait Indicator: Send + Sync {
    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Indicator periods count bars, so zero is rejected at construction.
pub(crate) fn checked_period(field: &'static str, period: usize) -> Result<usize, ConfigError> {
    if period == 0 {
        return Err(invalid(field, "must be >= 1"));
    }
    Ok(period)
}

/// Last non-NaN value of a series.
pub fn last_valid(series: &[f64]) -> Option<f64> {
    series.iter().rev().copied().find(|v| !v.is_nan())
}

/// Create synthetic hourly bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high/low = body +/- 0.0005.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 0.0005;
            let low = open.min(close) - 0.0005;
            Bar::new(base + chrono::Duration::hours(i as i64), open, high, low, close)
        })
        .collect()
}

/// Create synthetic hourly bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Bar::new(base + chrono::Duration::hours(i as i64), open, high, low, close)
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

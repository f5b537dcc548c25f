//! Bar: the fundamental market data unit, and the append-only series that holds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One closed OHLC bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Signed candle body (positive for an up bar).
    pub fn body(&self) -> f64 {
        self.close - self.open
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar at {incoming} is not after the last bar at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        incoming: DateTime<Utc>,
    },

    #[error("bar at {0} has inconsistent OHLC values")]
    Insane(DateTime<Utc>),
}

/// Append-only, strictly time-ordered bar store with random access.
///
/// Event ages are expressed in bars by locating the event time in the series
/// (`bars_since`), so callers never need to know the bar interval.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self { bars: Vec::new() }
    }

    /// Build a series from bars, validating order and sanity of every bar.
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, BarError> {
        let mut series = Self {
            bars: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            series.push(bar)?;
        }
        Ok(series)
    }

    /// Append a closed bar. Bars must arrive in strictly increasing time order.
    pub fn push(&mut self, bar: Bar) -> Result<(), BarError> {
        if !bar.is_sane() {
            return Err(BarError::Insane(bar.time));
        }
        if let Some(last) = self.bars.last() {
            if bar.time <= last.time {
                return Err(BarError::OutOfOrder {
                    last: last.time,
                    incoming: bar.time,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Index of the most recent bar.
    pub fn current_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(1)
    }

    /// The last `n` bars (fewer if the series is shorter).
    pub fn tail(&self, n: usize) -> &[Bar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    /// Index of the last bar whose time is at or before `time`.
    ///
    /// Returns `None` when `time` precedes the first bar.
    pub fn index_at_or_before(&self, time: DateTime<Utc>) -> Option<usize> {
        let after = self.bars.partition_point(|b| b.time <= time);
        after.checked_sub(1)
    }

    /// How many bars have closed since the bar containing `time`.
    ///
    /// An event on the current bar is 0 bars old. Events older than the whole
    /// series return `None` and are treated as outside every lookback window.
    pub fn bars_since(&self, time: DateTime<Utc>) -> Option<usize> {
        let current = self.current_index()?;
        let index = self.index_at_or_before(time)?;
        Some(current - index)
    }

    /// Highest high over the last `n` bars.
    pub fn highest_high(&self, n: usize) -> Option<f64> {
        self.tail(n).iter().map(|b| b.high).reduce(f64::max)
    }

    /// Lowest low over the last `n` bars.
    pub fn lowest_low(&self, n: usize) -> Option<f64> {
        self.tail(n).iter().map(|b| b.low).reduce(f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn sample_bar(minutes: i64) -> Bar {
        Bar::new(t(minutes), 1.1000, 1.1010, 1.0990, 1.1005)
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar(0).is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar(0);
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar(0);
        bar.high = 1.0980;
        assert!(!bar.is_sane());
    }

    #[test]
    fn series_rejects_out_of_order_bar() {
        let mut series = BarSeries::new();
        series.push(sample_bar(15)).unwrap();
        let err = series.push(sample_bar(15)).unwrap_err();
        assert!(matches!(err, BarError::OutOfOrder { .. }));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn series_bars_since() {
        let series = BarSeries::from_bars((0..10).map(|i| sample_bar(i * 15)).collect()).unwrap();
        // Current bar is index 9.
        assert_eq!(series.bars_since(t(135)), Some(0));
        assert_eq!(series.bars_since(t(0)), Some(9));
        // Mid-bar time maps to the bar that contains it.
        assert_eq!(series.bars_since(t(20)), Some(8));
        // Before the first bar.
        assert_eq!(series.bars_since(t(-5)), None);
        // Future event counts as the current bar.
        assert_eq!(series.bars_since(t(500)), Some(0));
    }

    #[test]
    fn series_tail_and_extremes() {
        let mut bars: Vec<Bar> = (0..5).map(|i| sample_bar(i * 15)).collect();
        bars[3].high = 1.1050;
        bars[1].low = 1.0900;
        let series = BarSeries::from_bars(bars).unwrap();
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(50).len(), 5);
        assert_eq!(series.highest_high(3), Some(1.1050));
        assert_eq!(series.lowest_low(3), Some(1.0990));
        assert_eq!(series.lowest_low(5), Some(1.0900));
    }

    #[test]
    fn empty_series_has_no_index() {
        let series = BarSeries::new();
        assert_eq!(series.current_index(), None);
        assert_eq!(series.bars_since(t(0)), None);
        assert_eq!(series.highest_high(10), None);
    }
}

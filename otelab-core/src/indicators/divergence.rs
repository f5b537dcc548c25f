//! Price/oscillator divergence over a fixed window.
//!
//! The window is split into an older and a newer half. Bearish divergence: the
//! newer half prints a higher high than the older half while the oscillator at that
//! high is lower. Bullish divergence mirrors it on lows.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    Bearish,
    Bullish,
}

impl DivergenceKind {
    /// The divergence that warns against a position in `direction`.
    pub fn against(direction: Direction) -> Self {
        match direction {
            Direction::Long => DivergenceKind::Bearish,
            Direction::Short => DivergenceKind::Bullish,
        }
    }
}

/// True when `kind` divergence is present over the last `window` bars.
///
/// `oscillator` must be aligned with `bars`. NaN oscillator readings at either
/// extreme mean no divergence.
pub fn detect_divergence(
    kind: DivergenceKind,
    bars: &[Bar],
    oscillator: &[f64],
    window: usize,
) -> bool {
    if window < 4 || bars.len() < window || oscillator.len() != bars.len() {
        return false;
    }
    let start = bars.len() - window;
    let mid = start + window / 2;

    let (older, newer) = match kind {
        DivergenceKind::Bearish => (
            extreme_index(bars, start, mid, |b| b.high, true),
            extreme_index(bars, mid, bars.len(), |b| b.high, true),
        ),
        DivergenceKind::Bullish => (
            extreme_index(bars, start, mid, |b| b.low, false),
            extreme_index(bars, mid, bars.len(), |b| b.low, false),
        ),
    };
    let (Some(older), Some(newer)) = (older, newer) else {
        return false;
    };

    let (osc_old, osc_new) = (oscillator[older], oscillator[newer]);
    if osc_old.is_nan() || osc_new.is_nan() {
        return false;
    }

    match kind {
        DivergenceKind::Bearish => bars[newer].high > bars[older].high && osc_new < osc_old,
        DivergenceKind::Bullish => bars[newer].low < bars[older].low && osc_new > osc_old,
    }
}

fn extreme_index(
    bars: &[Bar],
    from: usize,
    to: usize,
    value: impl Fn(&Bar) -> f64,
    highest: bool,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for i in from..to {
        let v = value(&bars[i]);
        let better = match best {
            None => true,
            Some(b) if highest => v > value(&bars[b]),
            Some(b) => v < value(&bars[b]),
        };
        if better {
            best = Some(i);
        }
    }
    best
}

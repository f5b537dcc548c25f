//! Market-structure primitives produced by the upstream detectors.
//!
//! The engine never computes these; it consumes them by reference and decides
//! which ones are allowed to drive an entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Bar, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Price ran a known liquidity level.
    Sweep,
    /// Close beyond a recent swing (market structure shift).
    Break,
}

/// Which liquidity pool a sweep ran. Each label can be toggled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepLabel {
    PriorDayHigh,
    PriorDayLow,
    CurrentDayHigh,
    CurrentDayLow,
    EqualHighs,
    EqualLows,
    WeeklyHigh,
    WeeklyLow,
    InternalSwing,
}

impl fmt::Display for SweepLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SweepLabel::PriorDayHigh => "PDH",
            SweepLabel::PriorDayLow => "PDL",
            SweepLabel::CurrentDayHigh => "CDH",
            SweepLabel::CurrentDayLow => "CDL",
            SweepLabel::EqualHighs => "EQH",
            SweepLabel::EqualLows => "EQL",
            SweepLabel::WeeklyHigh => "PWH",
            SweepLabel::WeeklyLow => "PWL",
            SweepLabel::InternalSwing => "ISW",
        };
        write!(f, "{s}")
    }
}

/// A sweep or a structure break.
///
/// `direction` is the direction the event favours: a sweep of sell-side
/// liquidity (lows taken) is `Long`, a bearish structure break is `Short`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    pub time: DateTime<Utc>,
    pub direction: Direction,
    /// Sweep extreme, or the swing level a break closed through.
    pub price: f64,
    pub kind: StructureKind,
    /// Liquidity label; `None` for breaks.
    pub label: Option<SweepLabel>,
}

impl StructureEvent {
    pub fn sweep(time: DateTime<Utc>, direction: Direction, price: f64, label: SweepLabel) -> Self {
        Self {
            time,
            direction,
            price,
            kind: StructureKind::Sweep,
            label: Some(label),
        }
    }

    pub fn structure_break(time: DateTime<Utc>, direction: Direction, price: f64) -> Self {
        Self {
            time,
            direction,
            price,
            kind: StructureKind::Break,
            label: None,
        }
    }

    pub fn is_sweep(&self) -> bool {
        self.kind == StructureKind::Sweep
    }

    pub fn is_break(&self) -> bool {
        self.kind == StructureKind::Break
    }
}

/// Fibonacci retracement band of a structural impulse (the entry zone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetracementZone {
    pub time: DateTime<Utc>,
    pub direction: Direction,
    pub low: f64,
    pub high: f64,
}

impl RetracementZone {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }

    /// True when `bar` retraced into the zone without closing through its far edge.
    ///
    /// Long zones are tapped from above (low reaches the zone high, close stays above
    /// the zone low); short zones mirror that.
    pub fn is_tapped_by(&self, bar: &Bar) -> bool {
        match self.direction {
            Direction::Long => bar.low <= self.high && bar.close >= self.low,
            Direction::Short => bar.high >= self.low && bar.close <= self.high,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade or structure direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Bullish: profits when price rises.
    Long,
    /// Bearish: profits when price falls.
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Signed move from `from` to `to`, positive when it favours this direction.
    pub fn favorable_move(self, from: f64, to: f64) -> f64 {
        self.sign() * (to - from)
    }

    /// Move `price` by `distance` in this direction's favour.
    pub fn advance(self, price: f64, distance: f64) -> f64 {
        price + self.sign() * distance
    }

    /// Move `price` by `distance` against this direction.
    pub fn retreat(self, price: f64, distance: f64) -> f64 {
        price - self.sign() * distance
    }

    /// True if `candidate` is strictly better than `reference` for a stop on this side
    /// (higher for long, lower for short).
    pub fn is_better_stop(self, candidate: f64, reference: f64) -> bool {
        match self {
            Direction::Long => candidate > reference,
            Direction::Short => candidate < reference,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

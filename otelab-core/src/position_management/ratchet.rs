//! Ratchet invariant enforcement.
//!
//! **Core rule:** a stop may only improve. A proposal is applied only when it is
//! strictly better than the current level (higher for long, lower for short);
//! anything else is dropped without error, which makes repeated identical proposals
//! idempotent.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;

/// Stop-loss level of one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatchetState {
    level: f64,
    direction: Direction,
}

impl RatchetState {
    /// Start from the initial stop of a fill.
    pub fn new(direction: Direction, initial_level: f64) -> Self {
        Self {
            level: initial_level,
            direction,
        }
    }

    /// Apply `proposed` if it improves the stop.
    ///
    /// Returns the new level when applied, `None` when dropped.
    ///
    /// # Example
    /// ```
    /// use otelab_core::domain::Direction;
    /// use otelab_core::position_management::RatchetState;
    ///
    /// let mut ratchet = RatchetState::new(Direction::Long, 1.0950);
    /// assert_eq!(ratchet.propose(1.0980), Some(1.0980));
    /// assert_eq!(ratchet.propose(1.0960), None);
    /// assert_eq!(ratchet.level(), 1.0980);
    /// ```
    pub fn propose(&mut self, proposed: f64) -> Option<f64> {
        if proposed.is_finite() && self.direction.is_better_stop(proposed, self.level) {
            self.level = proposed;
            Some(proposed)
        } else {
            None
        }
    }

    /// Whether `proposed` would be applied, without applying it.
    pub fn would_improve(&self, proposed: f64) -> bool {
        proposed.is_finite() && self.direction.is_better_stop(proposed, self.level)
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

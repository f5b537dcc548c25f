//! Requests the engine sends to the order gateway, and the fill it gets back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Direction, PositionId};

/// Market order with attached stop-loss and take-profit, expressed as distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub direction: Direction,
    /// Volume in lots, already rounded to the broker step.
    pub volume: f64,
    /// Stop distance from the fill price, in price units.
    pub stop_distance: f64,
    /// Target distance from the fill price, in price units.
    pub target_distance: f64,
    pub label: String,
    /// Rounded entry price the compliance checks were run against.
    pub expected_entry: f64,
}

/// Change the protective levels of an open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub position_id: PositionId,
    pub new_stop_loss: f64,
    pub new_take_profit: f64,
}

/// Close all or part of an open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseRequest {
    pub position_id: PositionId,
    /// Volume to close; `None` closes the whole position.
    pub volume: Option<f64>,
}

impl CloseRequest {
    pub fn full(position_id: PositionId) -> Self {
        Self {
            position_id,
            volume: None,
        }
    }

    pub fn partial(position_id: PositionId, volume: f64) -> Self {
        Self {
            position_id,
            volume: Some(volume),
        }
    }

    pub fn is_full(&self) -> bool {
        self.volume.is_none()
    }
}

/// Confirmed execution of an `OrderRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub position_id: PositionId,
    pub direction: Direction,
    pub entry_price: f64,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub time: DateTime<Utc>,
}

impl Fill {
    /// Distance between entry and the initial stop.
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }
}

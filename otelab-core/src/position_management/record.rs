//! Position records and the book that owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::RatchetState;
use crate::domain::{Direction, Fill, PositionId};
use crate::error::EngineError;

/// Which occurs-once actions have fired for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementStage {
    Fresh,
    BreakEvenApplied,
    PartialClosed,
    /// Break-even and partial close have both fired.
    Both,
}

impl ManagementStage {
    pub fn has_break_even(self) -> bool {
        matches!(self, ManagementStage::BreakEvenApplied | ManagementStage::Both)
    }

    pub fn has_partial(self) -> bool {
        matches!(self, ManagementStage::PartialClosed | ManagementStage::Both)
    }

    pub fn with_break_even(self) -> Self {
        if self.has_partial() {
            ManagementStage::Both
        } else {
            ManagementStage::BreakEvenApplied
        }
    }

    pub fn with_partial(self) -> Self {
        if self.has_break_even() {
            ManagementStage::Both
        } else {
            ManagementStage::PartialClosed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: PositionId,
    pub direction: Direction,
    pub entry_price: f64,
    /// Currently open volume.
    pub volume: f64,
    pub initial_volume: f64,
    /// |entry - initial stop|. Set once at fill; every R-multiple uses it.
    initial_risk: f64,
    pub open_time: DateTime<Utc>,
    pub confidence: f64,
    pub stage: ManagementStage,
    pub stop: RatchetState,
    pub take_profit: f64,
    /// A full close was sent; the record waits for the close notification.
    pub pending_close: bool,
}

impl PositionRecord {
    pub fn from_fill(fill: &Fill, confidence: f64) -> Result<Self, EngineError> {
        let initial_risk = fill.risk_distance();
        if initial_risk <= 0.0 || !initial_risk.is_finite() {
            return Err(EngineError::ZeroRiskFill(fill.position_id));
        }
        Ok(Self {
            id: fill.position_id,
            direction: fill.direction,
            entry_price: fill.entry_price,
            volume: fill.volume,
            initial_volume: fill.volume,
            initial_risk,
            open_time: fill.time,
            confidence,
            stage: ManagementStage::Fresh,
            stop: RatchetState::new(fill.direction, fill.stop_loss),
            take_profit: fill.take_profit,
            pending_close: false,
        })
    }

    pub fn initial_risk(&self) -> f64 {
        self.initial_risk
    }

    /// Signed favourable move from entry to `price`, in price units.
    pub fn profit(&self, price: f64) -> f64 {
        self.direction.favorable_move(self.entry_price, price)
    }

    /// Current reward in multiples of the initial risk.
    pub fn reward_r(&self, price: f64) -> f64 {
        self.profit(price) / self.initial_risk
    }

    /// Stop that locks `fraction` of the open profit at `price`.
    pub fn lock_profit_stop(&self, fraction: f64, price: f64) -> f64 {
        self.direction
            .advance(self.entry_price, fraction * self.profit(price))
    }
}

/// Arena of open positions keyed by the broker-assigned id.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    records: BTreeMap<PositionId, PositionRecord>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced (if the id was reused).
    pub fn insert(&mut self, record: PositionRecord) -> Option<PositionRecord> {
        self.records.insert(record.id, record)
    }

    pub fn remove(&mut self, id: PositionId) -> Option<PositionRecord> {
        self.records.remove(&id)
    }

    pub fn get(&self, id: PositionId) -> Option<&PositionRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: PositionId) -> Option<&mut PositionRecord> {
        self.records.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<PositionId> {
        self.records.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

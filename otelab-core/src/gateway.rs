//! Order gateway seam and an in-process paper venue.
//!
//! The engine only ever talks to a venue through `OrderGateway`. Calls are
//! synchronous: success or a `GatewayError`, never retried by the engine.
//!
//! `PaperGateway` fills market orders at the price the guard checked, keeps the
//! protective levels it was sent, and can replay bars against them so positions
//! stop out or hit target. It records every request it receives and can be told
//! to fail the next call of each kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{
    Bar, CloseRequest, Direction, Fill, ModifyRequest, OrderRequest, PositionId,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("order rejected by venue: {0}")]
    Rejected(String),

    #[error("venue unavailable: {0}")]
    Unavailable(String),

    #[error("venue does not know position {0}")]
    UnknownPosition(PositionId),
}

pub trait OrderGateway {
    /// Send a market order with attached stop-loss and take-profit.
    fn submit(&mut self, request: &OrderRequest) -> Result<Fill, GatewayError>;

    fn modify(&mut self, request: &ModifyRequest) -> Result<(), GatewayError>;

    fn close(&mut self, request: &CloseRequest) -> Result<(), GatewayError>;
}

/// Why a paper position left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Requested,
}

/// Realised slice of a paper position (a partial or the final close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperTrade {
    pub position_id: PositionId,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub volume: f64,
    pub exit_time: DateTime<Utc>,
    pub reason: ExitReason,
}

impl PaperTrade {
    /// Signed result in price units per unit of volume.
    pub fn price_move(&self) -> f64 {
        self.direction.favorable_move(self.entry_price, self.exit_price)
    }
}

#[derive(Debug, Clone)]
struct PaperPosition {
    fill: Fill,
    volume: f64,
    stop_loss: f64,
    take_profit: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PaperGateway {
    next_id: u64,
    clock: Option<DateTime<Utc>>,
    /// Price a requested close executes at.
    mark_price: Option<f64>,
    open: BTreeMap<PositionId, PaperPosition>,
    trades: Vec<PaperTrade>,

    pub submitted: Vec<OrderRequest>,
    pub modified: Vec<ModifyRequest>,
    pub closed: Vec<CloseRequest>,

    fail_submit: Option<GatewayError>,
    fail_modify: Option<GatewayError>,
    fail_close: Option<GatewayError>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Time stamped on fills and closes, and the price requested closes execute at.
    pub fn set_market(&mut self, time: DateTime<Utc>, price: f64) {
        self.clock = Some(time);
        self.mark_price = Some(price);
    }

    pub fn fail_next_submit(&mut self, error: GatewayError) {
        self.fail_submit = Some(error);
    }

    pub fn fail_next_modify(&mut self, error: GatewayError) {
        self.fail_modify = Some(error);
    }

    pub fn fail_next_close(&mut self, error: GatewayError) {
        self.fail_close = Some(error);
    }

    pub fn open_positions(&self) -> Vec<PositionId> {
        self.open.keys().copied().collect()
    }

    pub fn stop_loss(&self, id: PositionId) -> Option<f64> {
        self.open.get(&id).map(|p| p.stop_loss)
    }

    pub fn open_volume(&self, id: PositionId) -> Option<f64> {
        self.open.get(&id).map(|p| p.volume)
    }

    pub fn trades(&self) -> &[PaperTrade] {
        &self.trades
    }

    /// Run one bar against every open position.
    ///
    /// When a bar spans both levels the stop is assumed to trade first. Returns
    /// the ids of positions that left the book.
    pub fn process_bar(&mut self, bar: &Bar) -> Vec<PositionId> {
        let mut exited = Vec::new();
        for (id, position) in &self.open {
            let hit = match position.fill.direction {
                Direction::Long if bar.low <= position.stop_loss => {
                    Some((position.stop_loss, ExitReason::StopLoss))
                }
                Direction::Short if bar.high >= position.stop_loss => {
                    Some((position.stop_loss, ExitReason::StopLoss))
                }
                Direction::Long if bar.high >= position.take_profit => {
                    Some((position.take_profit, ExitReason::TakeProfit))
                }
                Direction::Short if bar.low <= position.take_profit => {
                    Some((position.take_profit, ExitReason::TakeProfit))
                }
                _ => None,
            };
            if let Some((price, reason)) = hit {
                exited.push((*id, price, reason));
            }
        }

        let mut ids = Vec::with_capacity(exited.len());
        for (id, price, reason) in exited {
            if let Some(position) = self.open.remove(&id) {
                self.trades.push(PaperTrade {
                    position_id: id,
                    direction: position.fill.direction,
                    entry_price: position.fill.entry_price,
                    exit_price: price,
                    volume: position.volume,
                    exit_time: bar.time,
                    reason,
                });
                ids.push(id);
            }
        }
        ids
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_default()
    }
}

impl OrderGateway for PaperGateway {
    fn submit(&mut self, request: &OrderRequest) -> Result<Fill, GatewayError> {
        self.submitted.push(request.clone());
        if let Some(error) = self.fail_submit.take() {
            return Err(error);
        }
        if request.volume.is_nan() || request.volume <= 0.0 {
            return Err(GatewayError::Rejected(format!(
                "volume {} is not positive",
                request.volume
            )));
        }

        let id = PositionId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        let entry = request.expected_entry;
        let fill = Fill {
            position_id: id,
            direction: request.direction,
            entry_price: entry,
            volume: request.volume,
            stop_loss: request.direction.retreat(entry, request.stop_distance),
            take_profit: request.direction.advance(entry, request.target_distance),
            time: self.now(),
        };
        self.open.insert(
            id,
            PaperPosition {
                fill: fill.clone(),
                volume: fill.volume,
                stop_loss: fill.stop_loss,
                take_profit: fill.take_profit,
            },
        );
        Ok(fill)
    }

    fn modify(&mut self, request: &ModifyRequest) -> Result<(), GatewayError> {
        self.modified.push(request.clone());
        if let Some(error) = self.fail_modify.take() {
            return Err(error);
        }
        let position = self
            .open
            .get_mut(&request.position_id)
            .ok_or(GatewayError::UnknownPosition(request.position_id))?;
        position.stop_loss = request.new_stop_loss;
        position.take_profit = request.new_take_profit;
        Ok(())
    }

    fn close(&mut self, request: &CloseRequest) -> Result<(), GatewayError> {
        self.closed.push(request.clone());
        if let Some(error) = self.fail_close.take() {
            return Err(error);
        }
        let now = self.now();
        let mark = self.mark_price;
        let position = self
            .open
            .get_mut(&request.position_id)
            .ok_or(GatewayError::UnknownPosition(request.position_id))?;

        let volume = match request.volume {
            Some(v) if v > 0.0 && v < position.volume => v,
            Some(v) if v <= 0.0 => {
                return Err(GatewayError::Rejected(format!("close volume {v} is not positive")))
            }
            _ => position.volume,
        };
        self.trades.push(PaperTrade {
            position_id: request.position_id,
            direction: position.fill.direction,
            entry_price: position.fill.entry_price,
            exit_price: mark.unwrap_or(position.fill.entry_price),
            volume,
            exit_time: now,
            reason: ExitReason::Requested,
        });
        position.volume -= volume;
        if position.volume <= 0.0 {
            self.open.remove(&request.position_id);
        }
        Ok(())
    }
}

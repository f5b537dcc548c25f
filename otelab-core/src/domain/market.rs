//! Market and account state supplied by the venue each bar/tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Direction;

/// Top-of-book quote plus the venue's price precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    /// Size of one "pip" in price units (e.g. 0.0001 for EURUSD).
    pub pip_size: f64,
    /// Current spread in price units.
    pub spread: f64,
    /// Decimal places prices are rounded to by the venue.
    pub digits: u32,
}

impl MarketSnapshot {
    /// Build a snapshot whose spread is derived from the quotes.
    pub fn from_quotes(time: DateTime<Utc>, bid: f64, ask: f64, pip_size: f64, digits: u32) -> Self {
        Self {
            time,
            bid,
            ask,
            pip_size,
            spread: ask - bid,
            digits,
        }
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Price a market order in `direction` fills at (ask for long, bid for short).
    pub fn entry_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        }
    }

    /// Price an open position in `direction` is closed at (bid for long, ask for short).
    pub fn exit_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.bid,
            Direction::Short => self.ask,
        }
    }

    pub fn to_pips(&self, distance: f64) -> f64 {
        distance / self.pip_size
    }

    pub fn from_pips(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    pub fn spread_pips(&self) -> f64 {
        self.to_pips(self.spread)
    }

    /// Round a price to the venue precision.
    pub fn round_price(&self, price: f64) -> f64 {
        let scale = 10f64.powi(self.digits as i32);
        (price * scale).round() / scale
    }

    /// Round to the venue precision, moving in `direction`'s favour when `price`
    /// is not already on a tick.
    pub fn round_price_beyond(&self, direction: Direction, price: f64) -> f64 {
        let scale = 10f64.powi(self.digits as i32);
        let ticks = price * scale;
        let nearest = ticks.round();
        if (ticks - nearest).abs() < 1e-9 {
            return nearest / scale;
        }
        match direction {
            Direction::Long => ticks.ceil() / scale,
            Direction::Short => ticks.floor() / scale,
        }
    }
}

/// Account state at decision time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub equity: f64,
    pub free_margin: f64,
    /// Account leverage (e.g. 30.0 for 1:30). Used for margin estimates.
    pub leverage: f64,
}

/// Broker volume constraints for the traded symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerLimits {
    /// Units per 1.0 lot.
    pub contract_size: f64,
    pub min_volume: f64,
    pub max_volume: f64,
    pub volume_step: f64,
}

impl Default for BrokerLimits {
    fn default() -> Self {
        Self {
            contract_size: 100_000.0,
            min_volume: 0.01,
            max_volume: 100.0,
            volume_step: 0.01,
        }
    }
}

impl BrokerLimits {
    /// Account-currency value of one pip for one lot.
    pub fn pip_value_per_lot(&self, pip_size: f64) -> f64 {
        pip_size * self.contract_size
    }

    /// Round a volume down to the volume step.
    ///
    /// A tiny epsilon absorbs float noise so that 0.3 / 0.01 does not floor to 29.
    pub fn round_volume_down(&self, volume: f64) -> f64 {
        if self.volume_step <= 0.0 {
            return volume;
        }
        let steps = (volume / self.volume_step + 1e-9).floor();
        let rounded = steps * self.volume_step;
        // Strip representation noise introduced by the multiplication.
        (rounded * 1e8).round() / 1e8
    }

    /// Raise a volume to the broker minimum if it fell below it.
    pub fn floor_to_min(&self, volume: f64) -> f64 {
        volume.max(self.min_volume)
    }

    pub fn within_bounds(&self, volume: f64) -> bool {
        volume >= self.min_volume - 1e-12 && volume <= self.max_volume + 1e-12
    }
}

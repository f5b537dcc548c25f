//! Market context shared by every exit strategy in one update.
//!
//! Built once per bar or tick and reused for every open position.

use chrono::{DateTime, Utc};

use crate::config::ExitConfig;
use crate::domain::{Bar, Direction, MarketSnapshot, StructureEvent};
use crate::indicators::{efficiency_ratio, Indicator, Momentum, Rsi};

#[derive(Debug, Clone)]
pub struct ExitContext<'a> {
    pub bars: &'a [Bar],
    pub snapshot: &'a MarketSnapshot,
    pub now: DateTime<Utc>,
    /// Volatility-classifier ATR in price units (0 when unknown).
    pub atr: f64,
    /// Structure breaks first seen in this update.
    pub new_breaks: &'a [StructureEvent],
    /// RSI aligned with `bars`.
    pub rsi: Vec<f64>,
    /// Signed efficiency ratio over the momentum window.
    pub efficiency: Option<f64>,
    /// Close-to-close momentum aligned with `bars`.
    pub momentum: Vec<f64>,
}

impl<'a> ExitContext<'a> {
    pub fn build(
        bars: &'a [Bar],
        snapshot: &'a MarketSnapshot,
        atr: f64,
        new_breaks: &'a [StructureEvent],
        config: &ExitConfig,
    ) -> Self {
        // A zero period leaves its series all NaN; validated configs never have one.
        let rsi_indicator = Rsi::new(config.divergence.rsi_period).ok();
        let momentum_indicator = Momentum::new(config.momentum.momentum_period).ok();
        let rsi_lookback = rsi_indicator.as_ref().map_or(0, |i| i.lookback());
        let momentum_lookback = momentum_indicator.as_ref().map_or(0, |i| i.lookback());

        // Only the tail the strategies look at is needed; keep RSI warmup generous.
        let horizon = (config.divergence.window + rsi_lookback * 5)
            .max(config.momentum.efficiency_window + 1)
            .max(momentum_lookback + 3)
            .max(config.failure_swing.window + 1);
        let bars = &bars[bars.len().saturating_sub(horizon)..];

        let rsi = aligned(rsi_indicator.as_ref(), bars);
        let momentum = aligned(momentum_indicator.as_ref(), bars);

        Self {
            bars,
            snapshot,
            now: snapshot.time,
            atr,
            new_breaks,
            rsi,
            efficiency: efficiency_ratio(bars, config.momentum.efficiency_window),
            momentum,
        }
    }

    /// Price an open position in `direction` would close at.
    pub fn price_for(&self, direction: Direction) -> f64 {
        self.snapshot.exit_price(direction)
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn pips(&self, pips: f64) -> f64 {
        self.snapshot.from_pips(pips)
    }

    /// Round a proposed stop to the venue precision.
    pub fn round(&self, price: f64) -> f64 {
        self.snapshot.round_price(price)
    }
}

fn aligned(indicator: Option<&impl Indicator>, bars: &[Bar]) -> Vec<f64> {
    indicator.map_or_else(|| vec![f64::NAN; bars.len()], |i| i.compute(bars))
}

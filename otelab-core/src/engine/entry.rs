//! Turning a tapped zone into a trade signal.

use crate::config::{EntryConfig, RiskConfig};
use crate::domain::{Direction, MarketSnapshot, StructureEvent, TradeSignal};
use crate::indicators::VolatilityReading;
use crate::sequence::GateTier;
use crate::sizing::{StopDistance, StopLossSizer};

/// Signal plus the stop sizing that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPlan {
    pub signal: TradeSignal,
    pub stop: StopDistance,
}

#[derive(Debug, Clone)]
pub struct SignalBuilder {
    entry: EntryConfig,
    min_risk_reward: f64,
    sizer: StopLossSizer,
}

impl SignalBuilder {
    pub fn new(entry: EntryConfig, risk: &RiskConfig, sizer: StopLossSizer) -> Self {
        Self {
            entry,
            min_risk_reward: risk.min_risk_reward,
            sizer,
        }
    }

    /// Build the signal for an entry in `direction` against the locked sweep.
    ///
    /// Entry is the side of the book a market order takes. The raw stop reaches
    /// back to the swept level and is then sized; the target is the opposite
    /// liquidity when it lies ahead of entry, else the minimum RR multiple.
    pub fn build(
        &self,
        direction: Direction,
        sweep: &StructureEvent,
        opposite_liquidity: Option<f64>,
        tier: Option<GateTier>,
        snapshot: &MarketSnapshot,
        volatility: &VolatilityReading,
    ) -> EntryPlan {
        let entry = snapshot.entry_price(direction);
        let stop = self.sizer.size(entry - sweep.price, volatility, snapshot);
        let stop_loss = snapshot.round_price(stop.stop_price(direction, entry));

        let take_profit = match opposite_liquidity {
            Some(level) if direction.favorable_move(entry, level) > 0.0 => level,
            _ => self.min_rr_target(direction, entry, stop_loss, snapshot),
        };

        let mut signal = TradeSignal {
            direction,
            entry_price: entry,
            stop_loss,
            take_profit,
            confidence: 0.0,
            timestamp: snapshot.time,
        };
        signal.confidence = self.confidence(tier, signal.risk_reward());
        EntryPlan { signal, stop }
    }

    /// First venue price at least `min_risk_reward` times the rounded risk away.
    fn min_rr_target(
        &self,
        direction: Direction,
        entry: f64,
        stop_loss: f64,
        snapshot: &MarketSnapshot,
    ) -> f64 {
        let entry = snapshot.round_price(entry);
        let wanted = (entry - stop_loss).abs() * self.min_risk_reward;
        snapshot.round_price_beyond(direction, direction.advance(entry, wanted))
    }

    fn confidence(&self, tier: Option<GateTier>, risk_reward: f64) -> f64 {
        let mut confidence = self.entry.base_confidence;
        confidence -= match tier {
            Some(GateTier::Extended) => 0.2,
            Some(GateTier::AnyDirection) => 0.35,
            _ => 0.0,
        };
        if risk_reward >= 2.0 * self.min_risk_reward {
            confidence += 0.1;
        }
        confidence.clamp(0.0, 1.0)
    }
}

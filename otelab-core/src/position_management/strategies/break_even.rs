/// Break-even stop.
///
/// Once the trade has moved far enough in its favour, pull the stop to entry plus
/// a small offset. Fires at most once per position.
use super::ExitStrategy;
use crate::config::{BreakEvenConfig, BreakEvenTrigger};
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone)]
pub struct BreakEven {
    config: BreakEvenConfig,
}

impl BreakEven {
    pub fn new(config: BreakEvenConfig) -> Self {
        Self { config }
    }

    fn triggered(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> bool {
        let price = ctx.price_for(position.direction);
        match self.config.trigger {
            BreakEvenTrigger::RMultiple { r } => position.reward_r(price) >= r,
            BreakEvenTrigger::Distance { pips } => position.profit(price) >= ctx.pips(pips),
        }
    }
}

impl ExitStrategy for BreakEven {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BreakEven
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        if position.stage.has_break_even() || !self.triggered(position, ctx) {
            return ExitIntent::Hold;
        }
        ExitIntent::AdjustStop {
            price: position
                .direction
                .advance(position.entry_price, ctx.pips(self.config.offset_pips)),
        }
    }
}

/// Exit on a structure break against the position.
///
/// A break in the opposite direction after the fill means the move that justified
/// the trade has been invalidated. In profit the stop locks part of it; in loss
/// the position is closed.
use super::ExitStrategy;
use crate::config::StructuralExitConfig;
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone)]
pub struct StructuralExit {
    config: StructuralExitConfig,
}

impl StructuralExit {
    pub fn new(config: StructuralExitConfig) -> Self {
        Self { config }
    }

    fn opposing_break(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> bool {
        let against = position.direction.opposite();
        ctx.new_breaks
            .iter()
            .any(|e| e.is_break() && e.direction == against && e.time > position.open_time)
    }
}

impl ExitStrategy for StructuralExit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        if !self.opposing_break(position, ctx) {
            return ExitIntent::Hold;
        }
        let price = ctx.price_for(position.direction);
        let profit = position.profit(price);
        if profit > 0.0 {
            ExitIntent::AdjustStop {
                price: position.lock_profit_stop(self.config.lock_fraction, price),
            }
        } else if profit < 0.0 {
            ExitIntent::CloseFull
        } else {
            ExitIntent::Hold
        }
    }
}

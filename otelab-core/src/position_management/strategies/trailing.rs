/// Fixed-distance trailing stop, active once the trade is beyond `start_r`.
use super::ExitStrategy;
use crate::config::TrailingConfig;
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone)]
pub struct TrailingStop {
    config: TrailingConfig,
}

impl TrailingStop {
    pub fn new(config: TrailingConfig) -> Self {
        Self { config }
    }
}

impl ExitStrategy for TrailingStop {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Trailing
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        let price = ctx.price_for(position.direction);
        if position.reward_r(price) <= self.config.start_r {
            return ExitIntent::Hold;
        }
        ExitIntent::AdjustStop {
            price: position
                .direction
                .retreat(price, ctx.pips(self.config.distance_pips)),
        }
    }
}

/// Partial close.
///
/// Bank part of the position once the reward reaches the trigger. Fires at most
/// once per position.
use super::ExitStrategy;
use crate::config::PartialCloseConfig;
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone)]
pub struct PartialClose {
    config: PartialCloseConfig,
}

impl PartialClose {
    pub fn new(config: PartialCloseConfig) -> Self {
        Self { config }
    }
}

impl ExitStrategy for PartialClose {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PartialClose
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        if position.stage.has_partial() {
            return ExitIntent::Hold;
        }
        if position.reward_r(ctx.price_for(position.direction)) >= self.config.trigger_r {
            ExitIntent::ClosePartial {
                fraction: self.config.fraction,
            }
        } else {
            ExitIntent::Hold
        }
    }
}

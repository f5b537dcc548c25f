/// Time-based exit.
///
/// A trade that has gone nowhere after `max_hours` is closed; one that made a
/// little progress has its stop moved to entry. Deep losers are left to their
/// stop and clear winners to the other strategies.
use super::ExitStrategy;
use crate::config::TimeExitConfig;
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone)]
pub struct TimeExit {
    config: TimeExitConfig,
}

impl TimeExit {
    pub fn new(config: TimeExitConfig) -> Self {
        Self { config }
    }
}

impl ExitStrategy for TimeExit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TimeExit
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        let held_hours = (ctx.now - position.open_time).num_seconds() as f64 / 3600.0;
        if held_hours <= self.config.max_hours {
            return ExitIntent::Hold;
        }
        let r = position.reward_r(ctx.price_for(position.direction));
        let cfg = &self.config;
        if r > cfg.deep_loss_r && r < cfg.close_below_r {
            ExitIntent::CloseFull
        } else if r >= cfg.close_below_r && r < cfg.breakeven_below_r {
            ExitIntent::AdjustStop {
                price: position.entry_price,
            }
        } else {
            ExitIntent::Hold
        }
    }
}

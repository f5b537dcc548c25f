/// RSI divergence exit.
///
/// A bearish divergence warns a long and a bullish one warns a short. When the
/// trade is in profit beyond `min_r`, most of that profit is locked.
use super::ExitStrategy;
use crate::config::DivergenceExitConfig;
use crate::indicators::{detect_divergence, DivergenceKind};
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone)]
pub struct DivergenceExit {
    config: DivergenceExitConfig,
}

impl DivergenceExit {
    pub fn new(config: DivergenceExitConfig) -> Self {
        Self { config }
    }
}

impl ExitStrategy for DivergenceExit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Divergence
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        let price = ctx.price_for(position.direction);
        if position.reward_r(price) <= self.config.min_r {
            return ExitIntent::Hold;
        }
        let kind = DivergenceKind::against(position.direction);
        if detect_divergence(kind, ctx.bars, &ctx.rsi, self.config.window) {
            ExitIntent::AdjustStop {
                price: position.lock_profit_stop(self.config.lock_fraction, price),
            }
        } else {
            ExitIntent::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::position_management::strategies::testkit::{position, Scene, PIP};

    /// Warm-up chop, a sharp rally, a pullback and a slow grind to a marginally
    /// higher high on weaker RSI.
    fn bearish_divergence_closes() -> Vec<f64> {
        let mut steps = Vec::new();
        for _ in 0..10 {
            steps.extend([2.0, -2.0]);
        }
        steps.extend([8.0; 6]);
        steps.extend([-6.0; 4]);
        steps.extend([3.0; 9]);
        let mut closes = vec![1.1000];
        for step in steps {
            let last = closes[closes.len() - 1];
            closes.push(last + step * PIP);
        }
        closes
    }

    #[test]
    fn bearish_divergence_locks_long_profit() {
        let scene = Scene::new(Direction::Long, 1.1051).with_closes(&bearish_divergence_closes());
        let strategy = DivergenceExit::new(DivergenceExitConfig::default());
        match strategy.evaluate(&position(Direction::Long), &scene.ctx()) {
            ExitIntent::AdjustStop { price } => assert!((price - 1.103825).abs() < 1e-9),
            other => panic!("expected stop adjustment, got {other:?}"),
        }
    }

    #[test]
    fn requires_profit_beyond_threshold() {
        let scene = Scene::new(Direction::Long, 1.1005).with_closes(&bearish_divergence_closes());
        let strategy = DivergenceExit::new(DivergenceExitConfig::default());
        assert!(strategy.evaluate(&position(Direction::Long), &scene.ctx()).is_hold());
    }

    #[test]
    fn bearish_divergence_does_not_warn_a_short() {
        let scene = Scene::new(Direction::Short, 1.0950).with_closes(&bearish_divergence_closes());
        let strategy = DivergenceExit::new(DivergenceExitConfig::default());
        assert!(strategy.evaluate(&position(Direction::Short), &scene.ctx()).is_hold());
    }
}

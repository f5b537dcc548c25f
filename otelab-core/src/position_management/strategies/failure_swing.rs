/// Failure-swing exit.
///
/// If price has been unable to extend in the trade's favour by more than
/// `atr_multiple` x ATR over the last `window` bars, the move has stalled and
/// part of the open profit is locked. Only bars printed since the fill count.
use super::ExitStrategy;
use crate::config::FailureSwingConfig;
use crate::domain::Direction;
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone)]
pub struct FailureSwingExit {
    config: FailureSwingConfig,
}

impl FailureSwingExit {
    pub fn new(config: FailureSwingConfig) -> Self {
        Self { config }
    }

    /// Best favourable excursion over the window, measured from the close
    /// just before it. `None` when the position is younger than the window.
    fn extension(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> Option<f64> {
        let window = self.config.window;
        let bars = ctx.bars;
        if window == 0 || bars.len() < window + 1 {
            return None;
        }
        let held = bars
            .iter()
            .rev()
            .take_while(|b| b.time >= position.open_time)
            .count();
        if held < window {
            return None;
        }
        let reference = bars[bars.len() - window - 1].close;
        let recent = &bars[bars.len() - window..];
        let best = match position.direction {
            Direction::Long => recent.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            Direction::Short => recent.iter().map(|b| b.low).fold(f64::MAX, f64::min),
        };
        Some(position.direction.favorable_move(reference, best))
    }
}

impl ExitStrategy for FailureSwingExit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FailureSwing
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        if ctx.atr <= 0.0 {
            return ExitIntent::Hold;
        }
        let price = ctx.price_for(position.direction);
        if position.reward_r(price) <= self.config.min_r {
            return ExitIntent::Hold;
        }
        match self.extension(position, ctx) {
            Some(ext) if ext < self.config.atr_multiple * ctx.atr => ExitIntent::AdjustStop {
                price: position.lock_profit_stop(self.config.lock_fraction, price),
            },
            _ => ExitIntent::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position_management::strategies::testkit::{position, t0, Scene, PIP};
    use chrono::Duration;

    fn grind() -> Vec<f64> {
        (0..16).map(|i| 1.1010 + i as f64 * PIP).collect()
    }

    fn strategy() -> FailureSwingExit {
        FailureSwingExit::new(FailureSwingConfig::default())
    }

    #[test]
    fn stalled_move_locks_profit() {
        let scene = Scene::new(Direction::Long, 1.1025)
            .at(t0() + Duration::hours(4))
            .with_closes(&grind());
        match strategy().evaluate(&position(Direction::Long), &scene.ctx()) {
            ExitIntent::AdjustStop { price } => assert!((price - 1.1015).abs() < 1e-9),
            other => panic!("expected stop adjustment, got {other:?}"),
        }
    }

    #[test]
    fn extension_beyond_threshold_holds() {
        let mut scene = Scene::new(Direction::Long, 1.1025)
            .at(t0() + Duration::hours(4))
            .with_closes(&grind());
        scene.atr = 5.0 * PIP;
        assert!(strategy().evaluate(&position(Direction::Long), &scene.ctx()).is_hold());
    }

    #[test]
    fn young_position_holds() {
        let scene = Scene::new(Direction::Long, 1.1025).with_closes(&grind());
        assert!(strategy().evaluate(&position(Direction::Long), &scene.ctx()).is_hold());
    }

    #[test]
    fn unknown_atr_holds() {
        let mut scene = Scene::new(Direction::Long, 1.1025)
            .at(t0() + Duration::hours(4))
            .with_closes(&grind());
        scene.atr = 0.0;
        assert!(strategy().evaluate(&position(Direction::Long), &scene.ctx()).is_hold());
    }
}

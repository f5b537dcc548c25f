/// Momentum-based exits.
///
/// Four scenarios are checked in order and the first match wins:
///
/// 1. **Opposing impulse**: the last bar's body runs against the position by at
///    least `impulse_atr_multiple` x ATR. The stop is pulled just behind price.
/// 2. **Choppy**: the efficiency ratio is near zero while the trade is in profit.
///    Part of the profit is locked.
/// 3. **Exhaustion**: momentum is still favourable but has shrunk for three bars
///    in a row while the trade is well in profit. The position is closed.
/// 4. **Aligned**: the move is clean and in the trade's favour. A smaller share
///    of the profit is locked.
use serde::{Deserialize, Serialize};

use super::ExitStrategy;
use crate::config::MomentumExitConfig;
use crate::position_management::{ExitContext, ExitIntent, PositionRecord, StrategyKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumScenario {
    OpposingImpulse,
    Choppy,
    Exhaustion,
    Aligned,
}

#[derive(Debug, Clone)]
pub struct MomentumExit {
    config: MomentumExitConfig,
}

impl MomentumExit {
    pub fn new(config: MomentumExitConfig) -> Self {
        Self { config }
    }

    /// First scenario that matches, with the intent it produces.
    pub fn classify(
        &self,
        position: &PositionRecord,
        ctx: &ExitContext<'_>,
    ) -> Option<(MomentumScenario, ExitIntent)> {
        let direction = position.direction;
        let sign = direction.sign();
        let price = ctx.price_for(direction);
        let reward = position.reward_r(price);
        let cfg = &self.config;

        if let Some(bar) = ctx.last_bar() {
            let against = -sign * (bar.close - bar.open);
            if ctx.atr > 0.0 && against >= cfg.impulse_atr_multiple * ctx.atr {
                let stop = direction.retreat(price, ctx.pips(cfg.impulse_buffer_pips));
                return Some((
                    MomentumScenario::OpposingImpulse,
                    ExitIntent::AdjustStop { price: stop },
                ));
            }
        }

        if let Some(er) = ctx.efficiency {
            if er.abs() < cfg.choppy_below && reward >= cfg.choppy_min_r {
                return Some((
                    MomentumScenario::Choppy,
                    ExitIntent::AdjustStop {
                        price: position.lock_profit_stop(cfg.choppy_lock, price),
                    },
                ));
            }
        }

        if reward >= cfg.exhaustion_min_r && fading(&ctx.momentum, sign) {
            return Some((MomentumScenario::Exhaustion, ExitIntent::CloseFull));
        }

        if let Some(er) = ctx.efficiency {
            if sign * er >= cfg.aligned_above && reward >= cfg.aligned_min_r {
                return Some((
                    MomentumScenario::Aligned,
                    ExitIntent::AdjustStop {
                        price: position.lock_profit_stop(cfg.aligned_lock, price),
                    },
                ));
            }
        }

        None
    }
}

/// Last three momentum readings are favourable and strictly shrinking.
fn fading(momentum: &[f64], sign: f64) -> bool {
    if momentum.len() < 3 {
        return false;
    }
    let tail: Vec<f64> = momentum[momentum.len() - 3..]
        .iter()
        .map(|m| sign * m)
        .collect();
    tail.iter().all(|m| m.is_finite() && *m > 0.0) && tail[0] > tail[1] && tail[1] > tail[2]
}

impl ExitStrategy for MomentumExit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent {
        self.classify(position, ctx)
            .map(|(_, intent)| intent)
            .unwrap_or(ExitIntent::Hold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::position_management::strategies::testkit::{position, Scene, PIP};

    fn strategy() -> MomentumExit {
        MomentumExit::new(MomentumExitConfig::default())
    }

    fn path(start: f64, steps_pips: &[f64]) -> Vec<f64> {
        let mut closes = vec![start];
        for step in steps_pips {
            let last = closes[closes.len() - 1];
            closes.push(last + step * PIP);
        }
        closes
    }

    #[test]
    fn opposing_impulse_tightens_behind_price() {
        let scene = Scene::new(Direction::Long, 1.1020).with_bars(&[
            (1.1030, 1.1036, 1.1028, 1.1035),
            (1.1035, 1.1042, 1.1034, 1.1040),
            (1.1040, 1.1041, 1.1018, 1.1020),
        ]);
        let (scenario, intent) = strategy()
            .classify(&position(Direction::Long), &scene.ctx())
            .unwrap();
        assert_eq!(scenario, MomentumScenario::OpposingImpulse);
        match intent {
            ExitIntent::AdjustStop { price } => assert!((price - 1.1015).abs() < 1e-9),
            other => panic!("expected stop adjustment, got {other:?}"),
        }
    }

    #[test]
    fn chop_in_profit_locks_sixty_percent() {
        let closes = path(1.1030, &[-5.0, 5.0, -5.0, 5.0, -5.0, 5.0, -5.0, 5.0, -5.0]);
        let scene = Scene::new(Direction::Long, 1.1025).with_closes(&closes);
        let (scenario, intent) = strategy()
            .classify(&position(Direction::Long), &scene.ctx())
            .unwrap();
        assert_eq!(scenario, MomentumScenario::Choppy);
        match intent {
            ExitIntent::AdjustStop { price } => assert!((price - 1.1015).abs() < 1e-9),
            other => panic!("expected stop adjustment, got {other:?}"),
        }
    }

    #[test]
    fn fading_momentum_well_in_profit_closes() {
        let closes = path(1.1000, &[10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        let scene = Scene::new(Direction::Long, 1.1055).with_closes(&closes);
        let (scenario, intent) = strategy()
            .classify(&position(Direction::Long), &scene.ctx())
            .unwrap();
        assert_eq!(scenario, MomentumScenario::Exhaustion);
        assert_eq!(intent, ExitIntent::CloseFull);
    }

    #[test]
    fn clean_trend_locks_forty_percent() {
        let closes = path(1.1000, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let scene = Scene::new(Direction::Long, 1.1055).with_closes(&closes);
        let (scenario, intent) = strategy()
            .classify(&position(Direction::Long), &scene.ctx())
            .unwrap();
        assert_eq!(scenario, MomentumScenario::Aligned);
        match intent {
            ExitIntent::AdjustStop { price } => assert!((price - 1.1022).abs() < 1e-9),
            other => panic!("expected stop adjustment, got {other:?}"),
        }
    }

    #[test]
    fn clean_trend_against_short_is_not_aligned() {
        let closes = path(1.1000, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let scene = Scene::new(Direction::Short, 1.0950).with_closes(&closes);
        assert!(strategy()
            .evaluate(&position(Direction::Short), &scene.ctx())
            .is_hold());
    }

    #[test]
    fn no_history_holds() {
        let scene = Scene::new(Direction::Long, 1.1040);
        assert!(strategy().evaluate(&position(Direction::Long), &scene.ctx()).is_hold());
    }
}

/// Exit strategies.
///
/// Each strategy looks at one position and the shared market context and returns
/// one `ExitIntent`. Strategies are stateless: occurs-once bookkeeping lives on the
/// position record, and stop proposals go through the ratchet in the manager.
pub mod break_even;
pub mod divergence;
pub mod failure_swing;
pub mod momentum;
pub mod partial_close;
pub mod structural;
pub mod time_exit;
pub mod trailing;

pub use break_even::BreakEven;
pub use divergence::DivergenceExit;
pub use failure_swing::FailureSwingExit;
pub use momentum::{MomentumExit, MomentumScenario};
pub use partial_close::PartialClose;
pub use structural::StructuralExit;
pub use time_exit::TimeExit;
pub use trailing::TrailingStop;

use super::{ExitContext, ExitIntent, PositionRecord, StrategyKind, DEFAULT_ORDER};
use crate::config::ExitConfig;

pub trait ExitStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn evaluate(&self, position: &PositionRecord, ctx: &ExitContext<'_>) -> ExitIntent;
}

/// Enabled strategies in `DEFAULT_ORDER`.
pub fn build_battery(config: &ExitConfig) -> Vec<Box<dyn ExitStrategy>> {
    let mut battery: Vec<Box<dyn ExitStrategy>> = Vec::new();
    for kind in DEFAULT_ORDER {
        match kind {
            StrategyKind::BreakEven if config.break_even.enabled => {
                battery.push(Box::new(BreakEven::new(config.break_even.clone())))
            }
            StrategyKind::PartialClose if config.partial_close.enabled => {
                battery.push(Box::new(PartialClose::new(config.partial_close.clone())))
            }
            StrategyKind::Structural if config.structural.enabled => {
                battery.push(Box::new(StructuralExit::new(config.structural.clone())))
            }
            StrategyKind::Momentum if config.momentum.enabled => {
                battery.push(Box::new(MomentumExit::new(config.momentum.clone())))
            }
            StrategyKind::Divergence if config.divergence.enabled => {
                battery.push(Box::new(DivergenceExit::new(config.divergence.clone())))
            }
            StrategyKind::FailureSwing if config.failure_swing.enabled => {
                battery.push(Box::new(FailureSwingExit::new(config.failure_swing.clone())))
            }
            StrategyKind::TimeExit if config.time_exit.enabled => {
                battery.push(Box::new(TimeExit::new(config.time_exit.clone())))
            }
            StrategyKind::Trailing if config.trailing.enabled => {
                battery.push(Box::new(TrailingStop::new(config.trailing.clone())))
            }
            _ => {}
        }
    }
    battery
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_battery_follows_default_order() {
        let battery = build_battery(&ExitConfig::default());
        let kinds: Vec<_> = battery.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn disabled_strategies_are_skipped_in_place() {
        let mut config = ExitConfig::default();
        config.momentum.enabled = false;
        config.trailing.enabled = false;
        let kinds: Vec<_> = build_battery(&config).iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                StrategyKind::BreakEven,
                StrategyKind::PartialClose,
                StrategyKind::Structural,
                StrategyKind::Divergence,
                StrategyKind::FailureSwing,
                StrategyKind::TimeExit,
            ]
        );
    }
}

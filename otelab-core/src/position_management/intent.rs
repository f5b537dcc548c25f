/// Exit intents and the per-cycle decision built from them.
///
/// Strategies emit *intents*, never gateway calls. The risk manager folds the
/// intents of one cycle into a `CycleDecision` and only then talks to the gateway.
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ManagementStage;
use crate::domain::PositionId;

/// What one strategy wants for one position this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ExitIntent {
    Hold,
    /// Proposed stop price; subject to the ratchet.
    AdjustStop { price: f64 },
    /// Close this share of the open volume.
    ClosePartial { fraction: f64 },
    CloseFull,
}

impl ExitIntent {
    pub fn is_hold(&self) -> bool {
        matches!(self, ExitIntent::Hold)
    }

    /// Close intents end the cycle for the position.
    pub fn is_close(&self) -> bool {
        matches!(self, ExitIntent::ClosePartial { .. } | ExitIntent::CloseFull)
    }
}

/// The exit strategies, named so the evaluation order is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    BreakEven,
    PartialClose,
    Structural,
    Momentum,
    Divergence,
    FailureSwing,
    TimeExit,
    Trailing,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::BreakEven => "break_even",
            StrategyKind::PartialClose => "partial_close",
            StrategyKind::Structural => "structural",
            StrategyKind::Momentum => "momentum",
            StrategyKind::Divergence => "divergence",
            StrategyKind::FailureSwing => "failure_swing",
            StrategyKind::TimeExit => "time_exit",
            StrategyKind::Trailing => "trailing",
        };
        write!(f, "{s}")
    }
}

/// Evaluation order of the exit battery.
pub const DEFAULT_ORDER: [StrategyKind; 8] = [
    StrategyKind::BreakEven,
    StrategyKind::PartialClose,
    StrategyKind::Structural,
    StrategyKind::Momentum,
    StrategyKind::Divergence,
    StrategyKind::FailureSwing,
    StrategyKind::TimeExit,
    StrategyKind::Trailing,
];

/// One non-hold intent and whether it took effect on the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiredIntent {
    pub strategy: StrategyKind,
    pub intent: ExitIntent,
    /// False for stop proposals dropped by the ratchet.
    pub applied: bool,
}

/// Close action chosen for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "close", rename_all = "snake_case")]
pub enum CloseAction {
    Partial { fraction: f64 },
    Full,
}

/// Result of running the battery once over one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleDecision {
    pub position_id: PositionId,
    /// Improved stop, if any proposal survived the ratchet.
    pub new_stop: Option<f64>,
    pub close: Option<CloseAction>,
    /// Stage after occurs-once strategies fired this cycle.
    pub stage: ManagementStage,
    pub fired: Vec<FiredIntent>,
}

impl CycleDecision {
    pub fn hold(position_id: PositionId, stage: ManagementStage) -> Self {
        Self {
            position_id,
            new_stop: None,
            close: None,
            stage,
            fired: Vec::new(),
        }
    }

    pub fn is_hold(&self) -> bool {
        self.new_stop.is_none() && self.close.is_none()
    }

    pub fn closes_fully(&self) -> bool {
        matches!(self.close, Some(CloseAction::Full))
    }
}

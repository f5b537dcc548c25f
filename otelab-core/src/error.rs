//! Error kinds surfaced by the engine.
//!
//! Everything that can go wrong inside a bar is an `EngineError`; the engine reports
//! it once at the top of the bar loop and carries on with the next bar.

use thiserror::Error;

use crate::domain::{Direction, PositionId};
use crate::gateway::GatewayError;
use crate::guard::GuardRejection;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("insufficient history: need {needed} bars, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error("guard rejected order: {0}")]
    GuardRejected(GuardRejection),

    #[error("sequence gate failed for {direction} entry")]
    SequenceGateFailed { direction: Direction },

    #[error("gateway failed: {cause}")]
    GatewayFailed { cause: GatewayError },

    #[error("unknown position {0}")]
    UnknownPosition(PositionId),

    #[error("fill for position {0} has no distance between entry and stop")]
    ZeroRiskFill(PositionId),
}

impl EngineError {
    /// Expected, non-exceptional outcomes: the action is simply not taken.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::GuardRejected(_) | EngineError::SequenceGateFailed { .. }
        )
    }
}

impl From<GuardRejection> for EngineError {
    fn from(rejection: GuardRejection) -> Self {
        EngineError::GuardRejected(rejection)
    }
}

impl From<GatewayError> for EngineError {
    fn from(cause: GatewayError) -> Self {
        EngineError::GatewayFailed { cause }
    }
}

/// Failure to load or validate an `EngineConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

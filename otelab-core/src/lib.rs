//! otelab core: the decision engine behind sweep -> break -> retracement entries.
//!
//! This crate contains:
//! - Domain types (bars, structure events, market snapshot, requests, fills)
//! - Volatility classifier and the indicators the exits read
//! - Adaptive stop-loss sizing and risk-based position sizing
//! - Execution guard (spread veto, broker compliance)
//! - Sequence gate and the episode lifecycle state machine
//! - Position risk management with the ratchet invariant
//! - The per-bar decision engine and the order gateway seam

pub mod advisory;
pub mod config;
pub mod domain;
pub mod engine;
pub mod episode;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod indicators;
pub mod position_management;
pub mod sequence;
pub mod sizing;

pub use config::EngineConfig;
pub use engine::{BarInput, BarReport, DecisionEngine};
pub use error::{ConfigError, EngineError};
pub use gateway::{GatewayError, OrderGateway, PaperGateway};

//! Stop-loss distance and position volume.
//!
//! The stop sizer turns a raw signal distance into a clamped, volatility-aware stop.
//! The position sizer turns that stop into a broker-compliant volume.

pub mod position;
pub mod stop_loss;

pub use position::{PositionSizer, SizeAdjustment, SizedVolume, SizingInput};
pub use stop_loss::{ClampBound, ClampEvent, StopDistance, StopLossSizer};

//! Domain types for the otelab decision engine.

pub mod bar;
pub mod direction;
pub mod ids;
pub mod market;
pub mod order;
pub mod signal;
pub mod structure;

pub use bar::{Bar, BarError, BarSeries};
pub use direction::Direction;
pub use ids::PositionId;
pub use market::{AccountState, BrokerLimits, MarketSnapshot};
pub use order::{CloseRequest, Fill, ModifyRequest, OrderRequest};
pub use signal::TradeSignal;
pub use structure::{RetracementZone, StructureEvent, StructureKind, SweepLabel};

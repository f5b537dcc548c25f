/// Position risk management: exit battery + ratchet invariant
///
/// **Key Design Principles:**
/// 1. Exit strategies emit **intents**, never gateway calls
/// 2. **Ratchet invariant**: stops may tighten, never loosen
/// 3. **Occurs-once**: break-even and partial close fire at most once per position
/// 4. Strategies run in a fixed, named order; the first close ends the cycle
///
/// **Module Structure:**
/// - `context`: market context shared by all strategies in one update
/// - `intent`: exit intents and the per-cycle decision
/// - `ratchet`: stop-level enforcement
/// - `record`: position records, management stage, the position book
/// - `manager`: `PositionRiskManager`, which owns the book and talks to the gateway
/// - `strategies`: the eight exit strategies
pub mod context;
pub mod intent;
pub mod manager;
pub mod ratchet;
pub mod record;
pub mod strategies;

pub use context::ExitContext;
pub use intent::{CloseAction, CycleDecision, ExitIntent, FiredIntent, StrategyKind, DEFAULT_ORDER};
pub use manager::{ManagementAction, ManagementReport, PositionRiskManager};
pub use ratchet::RatchetState;
pub use record::{ManagementStage, PositionBook, PositionRecord};
pub use strategies::{build_battery, ExitStrategy};

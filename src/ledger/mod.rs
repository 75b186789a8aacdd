//! Position & P&L ledger
//!
//! The only mutating surface of the desk. Orders come in, positions and
//! balance changes come out; everything else reads.

mod engine;
mod position;

pub use engine::{AutoClose, CloseTrigger, Ledger, TickOutcome};
pub use position::{OrderKind, OrderRequest, Position, PositionStatus, Side};

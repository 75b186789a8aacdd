//! Error types for the trading desk
//!
//! Every business-rule failure is synchronous and leaves ledger state
//! unchanged; none are retried automatically.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::PositionStatus;

pub type Result<T> = std::result::Result<T, DeskError>;

/// Desk-wide error taxonomy
#[derive(Error, Debug, Clone)]
pub enum DeskError {
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("invalid quantity {quantity} for {symbol}: must be a positive multiple of {increment}")]
    InvalidQuantity {
        symbol: String,
        quantity: Decimal,
        increment: Decimal,
    },

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("position not found: {0}")]
    PositionNotFound(Uuid),

    #[error("position {id} is {status}: cannot {action}")]
    InvalidState {
        id: Uuid,
        status: PositionStatus,
        action: &'static str,
    },

    #[error("unknown account: {0}")]
    UnknownAccount(Uuid),

    #[error("no quote available for {0}")]
    QuoteUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

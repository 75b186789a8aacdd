//! Accounts and virtual cash balances
//!
//! A balance is a non-negative fixed-point amount held at 2 decimal places.
//! It is only ever mutated from inside the ledger's atomic open/close
//! operations; nothing else calls `debit`/`credit` directly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeskError, Result};

/// A platform user. Created at registration; identity only. The cash
/// balance lives in the account's ledger book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: &str, is_admin: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_admin,
            created_at: Utc::now(),
        }
    }
}

/// Non-negative virtual cash balance, kept at 2 decimal places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashBalance(Decimal);

impl CashBalance {
    /// Negative seeds are clamped to zero; registration is an
    /// administrative path and never carries debt.
    pub fn new(initial: Decimal) -> Self {
        Self(initial.max(Decimal::ZERO).round_dp(2))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Remove cash. Fails with `InsufficientFunds` and leaves the balance
    /// untouched when `amount` exceeds what is available.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        debug_assert!(amount >= Decimal::ZERO);
        let amount = amount.round_dp(2);
        if amount > self.0 {
            return Err(DeskError::InsufficientFunds {
                required: amount,
                available: self.0,
            });
        }
        self.0 -= amount;
        Ok(())
    }

    /// Add cash. Always succeeds; the balance can never become negative
    /// through a credit.
    pub fn credit(&mut self, amount: Decimal) {
        debug_assert!(amount >= Decimal::ZERO);
        self.0 += amount.round_dp(2);
    }
}

//! Instrument registry
//!
//! Symbols and their numeric precision rules. Read-mostly: registration is
//! an administrative operation, lookups happen on every order.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, Result};

/// A tradable symbol. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    /// Minimum quantity increment; every order quantity must be a
    /// positive multiple of this.
    pub min_qty: Decimal,
    /// Decimal places quotes for this symbol are rounded to.
    pub price_precision: u32,
}

impl Instrument {
    /// Checks `quantity` against this instrument's increment.
    pub fn validate_quantity(&self, quantity: Decimal) -> Result<()> {
        let valid = quantity > Decimal::ZERO
            && (self.min_qty <= Decimal::ZERO || quantity % self.min_qty == Decimal::ZERO);
        if valid {
            Ok(())
        } else {
            Err(DeskError::InvalidQuantity {
                symbol: self.symbol.clone(),
                quantity,
                increment: self.min_qty,
            })
        }
    }
}

/// Symbol → instrument map consulted by the ledger on every order.
pub struct InstrumentRegistry {
    instruments: RwLock<HashMap<String, Instrument>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, instrument: Instrument) {
        self.instruments
            .write()
            .insert(instrument.symbol.clone(), instrument);
    }

    pub fn lookup(&self, symbol: &str) -> Result<Instrument> {
        self.instruments
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| DeskError::UnknownInstrument(symbol.to_string()))
    }

    /// All registered instruments, sorted by symbol.
    pub fn all(&self) -> Vec<Instrument> {
        let mut all: Vec<Instrument> = self.instruments.read().values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Market quote feed
//!
//! The ledger consumes quotes as a push stream: one [`QuoteUpdate`] per
//! symbol per tick, delivered over an mpsc channel. The latest quote per
//! symbol is cached on a [`QuoteBoard`] so that ledger operations can look
//! prices up without blocking; no quote lookup ever leaves the process.
//!
//! Sources implement [`QuoteSource`]. The price oracle itself is external;
//! the shipped implementations are a random-walk simulator for the running
//! service and a scripted replay for deterministic runs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::{FeedConfig, InstrumentConfig};
use crate::error::Result;

/// Latest known price for an instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// One tick of the push stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteUpdate {
    pub symbol: String,
    pub quote: Quote,
}

impl QuoteUpdate {
    pub fn new(symbol: &str, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            quote: Quote {
                price,
                timestamp: Utc::now(),
            },
        }
    }
}

/// Cache of the latest quote per symbol. Lookups are non-blocking reads
/// against this board, never against the source.
pub struct QuoteBoard {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl QuoteBoard {
    pub fn new() -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
        }
    }

    pub fn publish(&self, symbol: &str, quote: Quote) {
        self.quotes.write().insert(symbol.to_string(), quote);
    }

    pub fn latest(&self, symbol: &str) -> Option<Quote> {
        self.quotes.read().get(symbol).cloned()
    }

    pub fn latest_price(&self, symbol: &str) -> Option<Decimal> {
        self.quotes.read().get(symbol).map(|q| q.price)
    }
}

impl Default for QuoteBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// A push-stream quote producer.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// Produce updates onto `tx` until the stream ends or the receiver
    /// goes away.
    async fn run(&self, tx: mpsc::Sender<QuoteUpdate>) -> Result<()>;
}

/// Random-walk simulator: each tick perturbs every symbol by up to
/// `max_move_bps` basis points around its last price.
pub struct SimulatedFeed {
    tick_interval: Duration,
    max_move_bps: i64,
    start_prices: Vec<(String, Decimal, u32)>,
}

impl SimulatedFeed {
    pub fn from_config(feed: &FeedConfig, instruments: &[InstrumentConfig]) -> Self {
        Self {
            tick_interval: Duration::from_millis(feed.tick_interval_ms),
            max_move_bps: feed.max_move_bps as i64,
            start_prices: instruments
                .iter()
                .map(|i| (i.symbol.clone(), i.base_price, i.price_precision))
                .collect(),
        }
    }

    /// One step of the walk: `offset_bps` of the current price, rounded to
    /// the instrument's precision, floored at the smallest tick.
    fn perturb(price: Decimal, precision: u32, offset_bps: i64) -> Decimal {
        let delta = price * Decimal::from(offset_bps) / dec!(10000);
        let next = (price + delta).round_dp(precision);
        if next <= Decimal::ZERO {
            Decimal::new(1, precision)
        } else {
            next
        }
    }
}

#[async_trait]
impl QuoteSource for SimulatedFeed {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn run(&self, tx: mpsc::Sender<QuoteUpdate>) -> Result<()> {
        tracing::info!(
            "simulated feed starting: {} symbols, tick every {:?}",
            self.start_prices.len(),
            self.tick_interval
        );

        let mut prices = self.start_prices.clone();
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            for (symbol, price, precision) in prices.iter_mut() {
                let offset = {
                    use rand::Rng;
                    let mut rng = rand::rng();
                    rng.random_range(-self.max_move_bps..=self.max_move_bps)
                };
                *price = Self::perturb(*price, *precision, offset);
                let update = QuoteUpdate::new(symbol, *price);
                if tx.send(update).await.is_err() {
                    // Receiver gone; the desk is shutting down.
                    return Ok(());
                }
            }
        }
    }
}

/// Replays a fixed sequence of updates, then ends. Satisfies the same
/// contract as the simulator with fully deterministic output.
pub struct ScriptedFeed {
    updates: Vec<QuoteUpdate>,
}

impl ScriptedFeed {
    pub fn new(updates: Vec<QuoteUpdate>) -> Self {
        Self { updates }
    }
}

#[async_trait]
impl QuoteSource for ScriptedFeed {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, tx: mpsc::Sender<QuoteUpdate>) -> Result<()> {
        for update in &self.updates {
            if tx.send(update.clone()).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

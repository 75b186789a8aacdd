//! Desk configuration
//!
//! Loaded from a TOML file (default `config.toml`); every section has
//! working defaults so an empty or missing file still boots a usable
//! desk with the stock symbol set.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::{DeskError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub account: AccountConfig,
    pub feed: FeedConfig,
    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            account: AccountConfig::default(),
            feed: FeedConfig::default(),
            instruments: default_instruments(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the REST API binds to
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Virtual balance granted at registration
    pub initial_balance: Decimal,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Milliseconds between simulated quote ticks
    pub tick_interval_ms: u64,
    /// Largest per-tick move, in basis points of the current price
    pub max_move_bps: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            max_move_bps: 30,
        }
    }
}

/// One tradable symbol: registry rules plus the simulator's start price.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub base_price: Decimal,
    #[serde(default = "default_min_qty")]
    pub min_qty: Decimal,
    #[serde(default = "default_price_precision")]
    pub price_precision: u32,
}

fn default_min_qty() -> Decimal {
    dec!(0.01)
}

fn default_price_precision() -> u32 {
    2
}

fn default_instruments() -> Vec<InstrumentConfig> {
    let equity = |symbol: &str, base_price: Decimal| InstrumentConfig {
        symbol: symbol.to_string(),
        base_price,
        min_qty: default_min_qty(),
        price_precision: default_price_precision(),
    };
    let fx = |symbol: &str, base_price: Decimal| InstrumentConfig {
        symbol: symbol.to_string(),
        base_price,
        min_qty: dec!(0.0001),
        price_precision: 4,
    };
    vec![
        equity("AAPL", dec!(182.63)),
        equity("GOOGL", dec!(138.21)),
        equity("MSFT", dec!(337.79)),
        fx("EUR/USD", dec!(1.0723)),
        fx("GBP/USD", dec!(1.2547)),
    ]
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .build()
            .map_err(|e| DeskError::Config(e.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|e| DeskError::Config(e.to_string()))
    }
}

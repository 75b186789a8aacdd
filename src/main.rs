//! Paper trading desk server

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use paperdesk::{
    config::Config,
    feed::{QuoteBoard, QuoteSource, SimulatedFeed},
    instrument::{Instrument, InstrumentRegistry},
    ledger::Ledger,
    server::{self, AppState},
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "paperdesk")]
#[command(about = "Simulated trading backend with an in-memory position & P&L ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API and the simulated quote feed
    Run,
    /// List configured instruments
    Symbols,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_desk(config).await,
        Commands::Symbols => show_symbols(config),
    }
}

async fn run_desk(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting paper trading desk");

    let registry = Arc::new(InstrumentRegistry::new());
    for instrument in &config.instruments {
        registry.register(Instrument {
            symbol: instrument.symbol.clone(),
            min_qty: instrument.min_qty,
            price_precision: instrument.price_precision,
        });
    }
    let quotes = Arc::new(QuoteBoard::new());
    let ledger = Arc::new(Ledger::new(registry.clone(), quotes.clone()));

    // Quote pipeline: the simulator pushes ticks, the ledger consumes
    // them for pending fills and stop-loss/take-profit evaluation.
    let (tx, mut rx) = mpsc::channel(256);
    let feed = SimulatedFeed::from_config(&config.feed, &config.instruments);
    tokio::spawn(async move {
        if let Err(e) = feed.run(tx).await {
            tracing::error!("quote feed error: {}", e);
        }
    });

    let ledger_for_feed = ledger.clone();
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            ledger_for_feed.on_quote(&update);
        }
    });

    let state = Arc::new(AppState {
        ledger,
        registry,
        quotes,
        default_balance: config.account.initial_balance,
    });
    let addr: SocketAddr = config.server.bind_addr.parse()?;
    server::serve(state, addr)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

fn show_symbols(config: Config) -> anyhow::Result<()> {
    println!("\nConfigured instruments:\n");
    println!(
        "{:<12} {:>12} {:>10} {:>10}",
        "Symbol", "Base price", "Min qty", "Precision"
    );
    println!("{}", "-".repeat(48));
    for instrument in &config.instruments {
        println!(
            "{:<12} {:>12} {:>10} {:>10}",
            instrument.symbol,
            instrument.base_price,
            instrument.min_qty,
            instrument.price_precision
        );
    }
    Ok(())
}

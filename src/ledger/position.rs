//! Position records, order kinds, and their state machine fields
//!
//! A position is a single paper trade. It is born `Pending` (non-market
//! kinds) or `Open` (market fill), closes exactly once, and is never
//! deleted: closed and cancelled records stay around for reporting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DeskError, Result};

/// Trade direction. `Buy` opens a long, `Sell` opens a short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Requested order kind: a closed variant set, each kind carrying only
/// the trigger fields it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit { limit_price: Decimal },
    Stop { stop_price: Decimal },
    StopLimit { stop_price: Decimal, limit_price: Decimal },
}

impl Default for OrderKind {
    fn default() -> Self {
        OrderKind::Market
    }
}

impl OrderKind {
    pub fn is_market(&self) -> bool {
        matches!(self, OrderKind::Market)
    }

    /// Trigger prices must be strictly positive.
    pub fn validate(&self) -> Result<()> {
        let ok = match self {
            OrderKind::Market => true,
            OrderKind::Limit { limit_price } => *limit_price > Decimal::ZERO,
            OrderKind::Stop { stop_price } => *stop_price > Decimal::ZERO,
            OrderKind::StopLimit {
                stop_price,
                limit_price,
            } => *stop_price > Decimal::ZERO && *limit_price > Decimal::ZERO,
        };
        if ok {
            Ok(())
        } else {
            Err(DeskError::InvalidRequest(
                "order trigger prices must be positive".to_string(),
            ))
        }
    }

    /// Whether `quote` fills a pending order of this kind for `side`,
    /// returning the fill price (the triggering quote).
    ///
    /// Limit buys fill at or below the limit, limit sells at or above.
    /// Stops arm in the adverse direction: a stop buy fills at or above
    /// the stop, a stop sell at or below. A stop-limit fills only when
    /// the same quote satisfies both.
    pub fn try_trigger(&self, side: Side, quote: Decimal) -> Option<Decimal> {
        let triggered = match (self, side) {
            (OrderKind::Market, _) => true,
            (OrderKind::Limit { limit_price }, Side::Buy) => quote <= *limit_price,
            (OrderKind::Limit { limit_price }, Side::Sell) => quote >= *limit_price,
            (OrderKind::Stop { stop_price }, Side::Buy) => quote >= *stop_price,
            (OrderKind::Stop { stop_price }, Side::Sell) => quote <= *stop_price,
            (
                OrderKind::StopLimit {
                    stop_price,
                    limit_price,
                },
                Side::Buy,
            ) => quote >= *stop_price && quote <= *limit_price,
            (
                OrderKind::StopLimit {
                    stop_price,
                    limit_price,
                },
                Side::Sell,
            ) => quote <= *stop_price && quote >= *limit_price,
        };
        triggered.then_some(quote)
    }
}

/// Position lifecycle. `Pending → Open → Closed`, with `Pending →
/// Cancelled` as the only other exit. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Pending,
    Open,
    Closed,
    Cancelled,
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStatus::Pending => write!(f, "pending"),
            PositionStatus::Open => write!(f, "open"),
            PositionStatus::Closed => write!(f, "closed"),
            PositionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An order submission as accepted by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    #[serde(default)]
    pub kind: OrderKind,
    pub quantity: Decimal,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
}

/// A single paper trade record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    /// Fill price; `None` while the order is still pending.
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub status: PositionStatus,
    /// Locked in at close; `None` otherwise.
    pub realized_pnl: Option<Decimal>,
    pub close_price: Option<Decimal>,
    /// Order placement time; list ordering key.
    pub opened_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    /// Terminal timestamp (close or cancel).
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// A fresh pending record for `request`. Market orders pass through
    /// this state internally and are filled in the same ledger operation.
    pub fn pending(request: &OrderRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: request.account_id,
            symbol: request.symbol.clone(),
            side: request.side,
            kind: request.kind,
            quantity: request.quantity,
            entry_price: None,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            status: PositionStatus::Pending,
            realized_pnl: None,
            close_price: None,
            opened_at: now,
            filled_at: None,
            closed_at: None,
        }
    }

    pub(crate) fn mark_filled(&mut self, price: Decimal, at: DateTime<Utc>) {
        self.status = PositionStatus::Open;
        self.entry_price = Some(price);
        self.filled_at = Some(at);
    }

    pub(crate) fn mark_closed(&mut self, price: Decimal, pnl: Decimal, at: DateTime<Utc>) {
        self.status = PositionStatus::Closed;
        self.close_price = Some(price);
        self.realized_pnl = Some(pnl);
        self.closed_at = Some(at);
    }

    pub(crate) fn mark_cancelled(&mut self, at: DateTime<Utc>) {
        self.status = PositionStatus::Cancelled;
        self.closed_at = Some(at);
    }

    /// Mark-to-market P&L against `current_price`; `None` unless Open.
    /// Recomputed on demand, never persisted.
    pub fn unrealized_pnl(&self, current_price: Decimal) -> Option<Decimal> {
        if self.status != PositionStatus::Open {
            return None;
        }
        let entry = self.entry_price?;
        let entry_notional = cash_notional(self.quantity, entry);
        let mark_notional = cash_notional(self.quantity, current_price);
        Some(match self.side {
            Side::Buy => mark_notional - entry_notional,
            Side::Sell => entry_notional - mark_notional,
        })
    }

    /// Whether `price` has crossed the stop-loss threshold (adverse move).
    pub fn stop_loss_hit(&self, price: Decimal) -> bool {
        match (self.stop_loss, self.side) {
            (Some(stop), Side::Buy) => price <= stop,
            (Some(stop), Side::Sell) => price >= stop,
            (None, _) => false,
        }
    }

    /// Whether `price` has crossed the take-profit threshold (favorable).
    pub fn take_profit_hit(&self, price: Decimal) -> bool {
        match (self.take_profit, self.side) {
            (Some(target), Side::Buy) => price >= target,
            (Some(target), Side::Sell) => price <= target,
            (None, _) => false,
        }
    }
}

/// Cash value of `quantity` at `price`, held at the balance's 2 decimal
/// places so every balance movement is exactly representable.
pub(crate) fn cash_notional(quantity: Decimal, price: Decimal) -> Decimal {
    (quantity * price).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(side: Side, kind: OrderKind) -> OrderRequest {
        OrderRequest {
            account_id: Uuid::new_v4(),
            symbol: "AAPL".to_string(),
            side,
            kind,
            quantity: dec!(10),
            stop_loss: None,
            take_profit: None,
        }
    }

    #[test]
    fn limit_buy_fills_at_or_below_limit() {
        let kind = OrderKind::Limit {
            limit_price: dec!(150),
        };
        assert_eq!(kind.try_trigger(Side::Buy, dec!(151)), None);
        assert_eq!(kind.try_trigger(Side::Buy, dec!(150)), Some(dec!(150)));
        assert_eq!(kind.try_trigger(Side::Buy, dec!(149.80)), Some(dec!(149.80)));
    }

    #[test]
    fn limit_sell_fills_at_or_above_limit() {
        let kind = OrderKind::Limit {
            limit_price: dec!(150),
        };
        assert_eq!(kind.try_trigger(Side::Sell, dec!(149)), None);
        assert_eq!(kind.try_trigger(Side::Sell, dec!(150.20)), Some(dec!(150.20)));
    }

    #[test]
    fn stop_arms_in_the_adverse_direction() {
        let kind = OrderKind::Stop {
            stop_price: dec!(150),
        };
        assert_eq!(kind.try_trigger(Side::Buy, dec!(149)), None);
        assert_eq!(kind.try_trigger(Side::Buy, dec!(150)), Some(dec!(150)));
        assert_eq!(kind.try_trigger(Side::Sell, dec!(151)), None);
        assert_eq!(kind.try_trigger(Side::Sell, dec!(149.50)), Some(dec!(149.50)));
    }

    #[test]
    fn stop_limit_requires_both_conditions() {
        let kind = OrderKind::StopLimit {
            stop_price: dec!(150),
            limit_price: dec!(155),
        };
        assert_eq!(kind.try_trigger(Side::Buy, dec!(149)), None);
        assert_eq!(kind.try_trigger(Side::Buy, dec!(152)), Some(dec!(152)));
        // Gapped past the limit: stays pending.
        assert_eq!(kind.try_trigger(Side::Buy, dec!(156)), None);
    }

    #[test]
    fn trigger_prices_must_be_positive() {
        assert!(OrderKind::Market.validate().is_ok());
        assert!(OrderKind::Limit {
            limit_price: dec!(1)
        }
        .validate()
        .is_ok());
        assert!(OrderKind::Limit {
            limit_price: Decimal::ZERO
        }
        .validate()
        .is_err());
        assert!(OrderKind::StopLimit {
            stop_price: dec!(1),
            limit_price: dec!(-2)
        }
        .validate()
        .is_err());
    }

    #[test]
    fn unrealized_pnl_signs_per_side() {
        let mut long = Position::pending(&request(Side::Buy, OrderKind::Market), Utc::now());
        long.mark_filled(dec!(100), Utc::now());
        assert_eq!(long.unrealized_pnl(dec!(103)), Some(dec!(30)));
        assert_eq!(long.unrealized_pnl(dec!(98)), Some(dec!(-20)));

        let mut short = Position::pending(&request(Side::Sell, OrderKind::Market), Utc::now());
        short.mark_filled(dec!(100), Utc::now());
        assert_eq!(short.unrealized_pnl(dec!(103)), Some(dec!(-30)));
        assert_eq!(short.unrealized_pnl(dec!(98)), Some(dec!(20)));
    }

    #[test]
    fn unrealized_pnl_is_none_unless_open() {
        let pending = Position::pending(&request(Side::Buy, OrderKind::Market), Utc::now());
        assert_eq!(pending.unrealized_pnl(dec!(100)), None);

        let mut closed = pending.clone();
        closed.mark_filled(dec!(100), Utc::now());
        closed.mark_closed(dec!(101), dec!(10), Utc::now());
        assert_eq!(closed.unrealized_pnl(dec!(100)), None);
    }

    #[test]
    fn threshold_crossings_flip_with_side() {
        let mut long = Position::pending(&request(Side::Buy, OrderKind::Market), Utc::now());
        long.stop_loss = Some(dec!(175));
        long.take_profit = Some(dec!(190));
        long.mark_filled(dec!(180.50), Utc::now());

        assert!(long.stop_loss_hit(dec!(174.99)));
        assert!(!long.stop_loss_hit(dec!(176)));
        assert!(long.take_profit_hit(dec!(195)));
        assert!(!long.take_profit_hit(dec!(189.99)));

        let mut short = Position::pending(&request(Side::Sell, OrderKind::Market), Utc::now());
        short.stop_loss = Some(dec!(190));
        short.take_profit = Some(dec!(175));
        short.mark_filled(dec!(180.50), Utc::now());

        assert!(short.stop_loss_hit(dec!(191)));
        assert!(short.take_profit_hit(dec!(174)));
    }

    #[test]
    fn order_kind_serde_is_tagged() {
        let kind: OrderKind =
            serde_json::from_str(r#"{"type":"stop_limit","stop_price":100,"limit_price":99}"#)
                .unwrap();
        assert_eq!(
            kind,
            OrderKind::StopLimit {
                stop_price: dec!(100),
                limit_price: dec!(99)
            }
        );

        let json = serde_json::to_string(&OrderKind::Market).unwrap();
        assert_eq!(json, r#"{"type":"market"}"#);
    }

    #[test]
    fn order_request_defaults_to_market() {
        let request: OrderRequest = serde_json::from_str(
            r#"{
                "account_id": "6f9c24f6-2f83-44fb-9c0a-2b59e1a1c0de",
                "symbol": "AAPL",
                "side": "buy",
                "quantity": "10"
            }"#,
        )
        .unwrap();
        assert_eq!(request.kind, OrderKind::Market);
        assert_eq!(request.side, Side::Buy);
        assert!(request.stop_loss.is_none());
    }
}

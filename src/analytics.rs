//! Read-only reporting projections over ledger state
//!
//! Nothing in here mutates; every value is derived on demand from
//! position records and the cash balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{Position, PositionStatus};

/// Balance and P&L snapshot for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: Uuid,
    /// Current cash balance
    pub balance: Decimal,
    /// Mark-to-market P&L over open positions
    pub unrealized_pnl: Decimal,
    /// Sum of closed positions' locked-in P&L
    pub realized_pnl: Decimal,
    pub open_count: u32,
    pub pending_count: u32,
    /// Balance plus unrealized P&L
    pub portfolio_value: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate statistics over an account's closed trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAnalytics {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Winning share of closed trades, as a percentage. Zero when no
    /// trades have closed.
    pub win_rate: Decimal,
    pub total_profit: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    /// Gross profit over gross loss, capped at 999 when lossless.
    pub profit_factor: Decimal,
}

impl TradeAnalytics {
    pub fn from_positions(positions: &[Position]) -> Self {
        let closed_pnls: Vec<Decimal> = positions
            .iter()
            .filter(|p| p.status == PositionStatus::Closed)
            .filter_map(|p| p.realized_pnl)
            .collect();

        let total_trades = closed_pnls.len() as u32;
        let mut winning_trades = 0u32;
        let mut losing_trades = 0u32;
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        let mut largest_win = Decimal::ZERO;
        let mut largest_loss = Decimal::ZERO;

        for pnl in &closed_pnls {
            if *pnl > Decimal::ZERO {
                winning_trades += 1;
                gross_profit += *pnl;
                largest_win = largest_win.max(*pnl);
            } else if *pnl < Decimal::ZERO {
                losing_trades += 1;
                gross_loss += pnl.abs();
                largest_loss = largest_loss.min(*pnl);
            }
        }

        let win_rate = if total_trades > 0 {
            (Decimal::from(winning_trades) / Decimal::from(total_trades)
                * Decimal::ONE_HUNDRED)
                .round_dp(2)
        } else {
            Decimal::ZERO
        };
        let average_win = if winning_trades > 0 {
            (gross_profit / Decimal::from(winning_trades)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let average_loss = if losing_trades > 0 {
            (-gross_loss / Decimal::from(losing_trades)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let profit_factor = if gross_loss > Decimal::ZERO {
            (gross_profit / gross_loss).round_dp(2)
        } else if gross_profit > Decimal::ZERO {
            Decimal::from(999)
        } else {
            Decimal::ZERO
        };

        Self {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_profit: closed_pnls.iter().sum(),
            average_win,
            average_loss,
            largest_win,
            largest_loss,
            profit_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{OrderKind, OrderRequest, Side};
    use rust_decimal_macros::dec;

    fn closed(pnl: Decimal) -> Position {
        let request = OrderRequest {
            account_id: Uuid::new_v4(),
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            kind: OrderKind::Market,
            quantity: dec!(1),
            stop_loss: None,
            take_profit: None,
        };
        let mut position = Position::pending(&request, Utc::now());
        position.mark_filled(dec!(100), Utc::now());
        position.mark_closed(dec!(100) + pnl, pnl, Utc::now());
        position
    }

    fn open() -> Position {
        let request = OrderRequest {
            account_id: Uuid::new_v4(),
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            kind: OrderKind::Market,
            quantity: dec!(1),
            stop_loss: None,
            take_profit: None,
        };
        let mut position = Position::pending(&request, Utc::now());
        position.mark_filled(dec!(100), Utc::now());
        position
    }

    #[test]
    fn win_rate_over_zero_closed_trades_is_zero() {
        let analytics = TradeAnalytics::from_positions(&[]);
        assert_eq!(analytics.total_trades, 0);
        assert_eq!(analytics.win_rate, Decimal::ZERO);
        assert_eq!(analytics.profit_factor, Decimal::ZERO);

        // Open positions alone change nothing either.
        let analytics = TradeAnalytics::from_positions(&[open()]);
        assert_eq!(analytics.total_trades, 0);
        assert_eq!(analytics.win_rate, Decimal::ZERO);
    }

    #[test]
    fn aggregates_over_mixed_results() {
        let positions = vec![
            closed(dec!(350.75)),
            closed(dec!(64.31)),
            closed(dec!(-45.20)),
            closed(dec!(-120.50)),
            open(),
        ];
        let analytics = TradeAnalytics::from_positions(&positions);

        assert_eq!(analytics.total_trades, 4);
        assert_eq!(analytics.winning_trades, 2);
        assert_eq!(analytics.losing_trades, 2);
        assert_eq!(analytics.win_rate, dec!(50.00));
        assert_eq!(analytics.total_profit, dec!(249.36));
        assert_eq!(analytics.largest_win, dec!(350.75));
        assert_eq!(analytics.largest_loss, dec!(-120.50));
        assert_eq!(analytics.average_win, dec!(207.53)); // (350.75 + 64.31) / 2
        assert_eq!(analytics.average_loss, dec!(-82.85));
        assert_eq!(analytics.profit_factor, dec!(2.50)); // 415.06 / 165.70
    }

    #[test]
    fn breakeven_trades_count_toward_total_only() {
        let positions = vec![closed(Decimal::ZERO), closed(dec!(10))];
        let analytics = TradeAnalytics::from_positions(&positions);
        assert_eq!(analytics.total_trades, 2);
        assert_eq!(analytics.winning_trades, 1);
        assert_eq!(analytics.losing_trades, 0);
        assert_eq!(analytics.win_rate, dec!(50.00));
    }

    #[test]
    fn lossless_profit_factor_is_capped() {
        let analytics = TradeAnalytics::from_positions(&[closed(dec!(5))]);
        assert_eq!(analytics.profit_factor, Decimal::from(999));
    }
}

//! REST API for the trading desk
//!
//! Carries the ledger operations to the UI layer. Route shape follows the
//! platform's web frontend: trades under `/api/trades`, market data under
//! `/api/market`, reporting under `/api/accounts`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Account;
use crate::analytics::{AccountSummary, TradeAnalytics};
use crate::error::DeskError;
use crate::feed::QuoteBoard;
use crate::instrument::InstrumentRegistry;
use crate::ledger::{Ledger, OrderRequest, Position, PositionStatus};

/// Shared state behind every handler.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub registry: Arc<InstrumentRegistry>,
    pub quotes: Arc<QuoteBoard>,
    /// Balance granted when a registration does not name one
    pub default_balance: Decimal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

fn status_for(err: &DeskError) -> StatusCode {
    match err {
        DeskError::UnknownInstrument(_)
        | DeskError::PositionNotFound(_)
        | DeskError::UnknownAccount(_) => StatusCode::NOT_FOUND,
        DeskError::InvalidQuantity { .. } | DeskError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        DeskError::InvalidState { .. } => StatusCode::CONFLICT,
        DeskError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DeskError::QuoteUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DeskError::Config(_) | DeskError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status_for(&self), Json(body)).into_response()
    }
}

// ============ Accounts ============

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    #[serde(default)]
    is_admin: bool,
    initial_balance: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    account: Account,
    balance: Decimal,
}

async fn register_account(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, DeskError> {
    let balance = request.initial_balance.unwrap_or(state.default_balance);
    if balance < Decimal::ZERO {
        return Err(DeskError::InvalidRequest(
            "initial balance must be non-negative".to_string(),
        ));
    }
    let account = state
        .ledger
        .create_account(&request.name, request.is_admin, balance);
    let balance = state.ledger.balance(account.id)?;
    Ok(Json(RegisterResponse { account, balance }))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>, DeskError> {
    Ok(Json(state.ledger.account(id)?))
}

async fn account_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountSummary>, DeskError> {
    Ok(Json(state.ledger.account_summary(id)?))
}

async fn account_analytics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TradeAnalytics>, DeskError> {
    Ok(Json(state.ledger.trade_analytics(id)?))
}

// ============ Trades ============

#[derive(Debug, Deserialize)]
struct ListTradesQuery {
    status: Option<PositionStatus>,
}

async fn list_trades(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListTradesQuery>,
) -> Result<Json<Vec<Position>>, DeskError> {
    Ok(Json(state.ledger.list_positions(id, query.status)?))
}

async fn open_trade(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OrderRequest>,
) -> Result<Json<Position>, DeskError> {
    Ok(Json(state.ledger.open_position(request)?))
}

async fn get_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Position>, DeskError> {
    Ok(Json(state.ledger.get_position(id)?))
}

#[derive(Debug, Default, Deserialize)]
struct CloseTradeRequest {
    #[serde(default)]
    close_price: Option<Decimal>,
}

async fn close_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<CloseTradeRequest>,
) -> Result<Json<Position>, DeskError> {
    Ok(Json(state.ledger.close_position(id, request.close_price)?))
}

async fn cancel_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Position>, DeskError> {
    Ok(Json(state.ledger.cancel_position(id)?))
}

// ============ Market data ============

#[derive(Debug, Serialize)]
struct SymbolQuote {
    symbol: String,
    min_qty: Decimal,
    price_precision: u32,
    price: Option<Decimal>,
    timestamp: Option<DateTime<Utc>>,
}

async fn list_symbols(State(state): State<Arc<AppState>>) -> Json<Vec<SymbolQuote>> {
    let symbols = state
        .registry
        .all()
        .into_iter()
        .map(|instrument| {
            let quote = state.quotes.latest(&instrument.symbol);
            SymbolQuote {
                symbol: instrument.symbol,
                min_qty: instrument.min_qty,
                price_precision: instrument.price_precision,
                price: quote.as_ref().map(|q| q.price),
                timestamp: quote.map(|q| q.timestamp),
            }
        })
        .collect();
    Json(symbols)
}

#[derive(Debug, Serialize)]
struct QuoteResponse {
    symbol: String,
    price: Decimal,
    timestamp: DateTime<Utc>,
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<QuoteResponse>, DeskError> {
    state.registry.lookup(&symbol)?;
    let quote = state
        .quotes
        .latest(&symbol)
        .ok_or_else(|| DeskError::QuoteUnavailable(symbol.clone()))?;
    Ok(Json(QuoteResponse {
        symbol,
        price: quote.price,
        timestamp: quote.timestamp,
    }))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Build the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/accounts", post(register_account))
        .route("/api/accounts/{id}", get(get_account))
        .route("/api/accounts/{id}/summary", get(account_summary))
        .route("/api/accounts/{id}/analytics", get(account_analytics))
        .route("/api/accounts/{id}/trades", get(list_trades))
        .route("/api/trades", post(open_trade))
        .route("/api/trades/{id}", get(get_trade))
        .route("/api/trades/{id}/close", post(close_trade))
        .route("/api/trades/{id}/cancel", post(cancel_trade))
        .route("/api/market/symbols", get(list_symbols))
        .route("/api/market/{*symbol}", get(get_quote))
        .with_state(state)
}

/// Bind and serve the API until the process exits.
pub async fn serve(
    state: Arc<AppState>,
    addr: std::net::SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);
    tracing::info!("desk API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_taxonomy_maps_to_http_status() {
        assert_eq!(
            status_for(&DeskError::UnknownInstrument("TSLA".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DeskError::PositionNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DeskError::InvalidState {
                id: Uuid::new_v4(),
                status: PositionStatus::Closed,
                action: "close",
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&DeskError::InsufficientFunds {
                required: Decimal::ONE,
                available: Decimal::ZERO,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&DeskError::QuoteUnavailable("AAPL".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn list_trades_query_parses_status() {
        let query: ListTradesQuery = serde_json::from_str(r#"{"status":"open"}"#).unwrap();
        assert_eq!(query.status, Some(PositionStatus::Open));
        let query: ListTradesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.status, None);
    }
}

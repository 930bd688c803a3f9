// 8.0.2: request, result and error types for settlement operations.

use crate::position::Position;
use crate::store::StoreError;
use crate::trade::Trade;
use crate::types::{AccountId, Price, Quote, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Wire shape of an order. Numbers stay raw here; the engine validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub shares: Decimal,
    pub price: Decimal,
    /// Overrides the configured fee rate for this order only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_rate: Option<Decimal>,
}

impl OrderRequest {
    pub fn new(account_id: AccountId, symbol: Symbol, side: Side, shares: Decimal, price: Decimal) -> Self {
        Self {
            account_id,
            symbol,
            side,
            shares,
            price,
            fee_rate: None,
        }
    }

    pub fn buy(account_id: AccountId, symbol: Symbol, shares: Decimal, price: Decimal) -> Self {
        Self::new(account_id, symbol, Side::Buy, shares, price)
    }

    pub fn sell(account_id: AccountId, symbol: Symbol, shares: Decimal, price: Decimal) -> Self {
        Self::new(account_id, symbol, Side::Sell, shares, price)
    }

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = Some(fee_rate);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub new_buying_power: Quote,
    /// `None` once a sell has exhausted the holding.
    pub position: Option<Position>,
    pub trade: Trade,
    /// How many read-validate-write cycles it took.
    pub attempts: u32,
}

impl SettlementResult {
    pub fn realized_pnl(&self) -> Option<Quote> {
        self.trade.realized_pnl
    }
}

/// Read-only preview of what an order would do right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuote {
    pub side: Side,
    pub symbol: Symbol,
    pub shares: Decimal,
    pub price: Price,
    pub estimated_value: Quote,
    pub fee: Quote,
    /// Cost including fee for buys, proceeds after fee for sells.
    pub net_value: Quote,
    pub buying_power: Quote,
    pub buying_power_after: Quote,
    pub held_shares: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Quote>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("Invalid quantity {shares}: {reason}")]
    InvalidQuantity { shares: Decimal, reason: String },

    #[error("Invalid price {0}: must be positive")]
    InvalidPrice(Decimal),

    #[error("Invalid fee rate {0}: must be in [0, 1)")]
    InvalidFeeRate(Decimal),

    #[error("Symbol must not be empty")]
    InvalidSymbol,

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Account {0} already exists")]
    AccountAlreadyExists(AccountId),

    #[error("Insufficient buying power: required {required}, available {available}")]
    InsufficientFunds { required: Quote, available: Quote },

    #[error("You do not own any shares of {0}")]
    NoSuchHolding(Symbol),

    #[error("You only own {held} shares of {symbol}, cannot sell {requested}")]
    InsufficientShares {
        symbol: Symbol,
        requested: Decimal,
        held: Decimal,
    },

    #[error("Commit conflicted with a concurrent order after {attempts} attempts")]
    CommitConflict { attempts: u32 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No price available for {symbol}: {reason}")]
    PriceUnavailable { symbol: Symbol, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidQuantity,
    InvalidPrice,
    InvalidFeeRate,
    InvalidSymbol,
    AccountNotFound,
    AccountAlreadyExists,
    InsufficientFunds,
    NoSuchHolding,
    InsufficientShares,
    CommitConflict,
    StoreUnavailable,
    PriceUnavailable,
}

impl SettlementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::InvalidQuantity { .. } => ErrorKind::InvalidQuantity,
            SettlementError::InvalidPrice(_) => ErrorKind::InvalidPrice,
            SettlementError::InvalidFeeRate(_) => ErrorKind::InvalidFeeRate,
            SettlementError::InvalidSymbol => ErrorKind::InvalidSymbol,
            SettlementError::AccountNotFound(_) => ErrorKind::AccountNotFound,
            SettlementError::AccountAlreadyExists(_) => ErrorKind::AccountAlreadyExists,
            SettlementError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            SettlementError::NoSuchHolding(_) => ErrorKind::NoSuchHolding,
            SettlementError::InsufficientShares { .. } => ErrorKind::InsufficientShares,
            SettlementError::CommitConflict { .. } => ErrorKind::CommitConflict,
            SettlementError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            SettlementError::PriceUnavailable { .. } => ErrorKind::PriceUnavailable,
        }
    }

    /// Whether the caller can do something about it (fix input, wait, retry).
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SettlementError::AccountNotFound(_) | SettlementError::AccountAlreadyExists(_)
        )
    }

    /// Whether resubmitting the identical request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::CommitConflict { .. }
                | SettlementError::StoreUnavailable(_)
                | SettlementError::PriceUnavailable { .. }
        )
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            SettlementError::InvalidQuantity { shares, .. } => Some(json!({ "shares": shares })),
            SettlementError::InvalidPrice(price) => Some(json!({ "price": price })),
            SettlementError::InvalidFeeRate(rate) => Some(json!({ "fee_rate": rate })),
            SettlementError::InsufficientFunds { required, available } => {
                Some(json!({ "required": required, "available": available }))
            }
            SettlementError::NoSuchHolding(symbol) => Some(json!({ "symbol": symbol })),
            SettlementError::InsufficientShares { symbol, requested, held } => {
                Some(json!({ "symbol": symbol, "requested": requested, "held": held }))
            }
            SettlementError::CommitConflict { attempts } => Some(json!({ "attempts": attempts })),
            SettlementError::PriceUnavailable { symbol, .. } => Some(json!({ "symbol": symbol })),
            SettlementError::InvalidSymbol
            | SettlementError::AccountNotFound(_)
            | SettlementError::AccountAlreadyExists(_)
            | SettlementError::StoreUnavailable(_) => None,
        }
    }
}

impl From<StoreError> for SettlementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SettlementError::AccountNotFound(id),
            StoreError::AlreadyExists(id) => SettlementError::AccountAlreadyExists(id),
            StoreError::Conflict { .. } => SettlementError::CommitConflict { attempts: 1 },
            StoreError::Unavailable(reason) => SettlementError::StoreUnavailable(reason),
        }
    }
}

/// Failure payload handed back to the caller, which maps `error_kind` to a message of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&SettlementError> for ErrorResponse {
    fn from(err: &SettlementError) -> Self {
        Self {
            error_kind: err.kind(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

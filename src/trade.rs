// 4.0: trade ledger entries. one per committed order, immutable, append-only.
// the store assigns sequence and timestamp at commit time so ledger order == write order.

use crate::types::{AccountId, Price, Quote, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub Uuid);

impl TradeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub account_id: AccountId,
    /// 1-based, gapless per account.
    pub sequence: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub shares: Decimal,
    pub price: Price,
    pub fee: Quote,
    pub timestamp: Timestamp,
    /// Only sells realize anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Quote>,
}

impl Trade {
    pub fn notional(&self) -> Quote {
        Quote::new(self.shares * self.price.value())
    }

    /// Signed effect on buying power: negative for buys, positive for sells.
    pub fn cash_delta(&self) -> Quote {
        match self.side {
            Side::Buy => Quote::zero().sub(self.notional()).sub(self.fee),
            Side::Sell => self.notional().sub(self.fee),
        }
    }
}

/// A trade that has been validated but not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeDraft {
    pub id: TradeId,
    pub symbol: Symbol,
    pub side: Side,
    pub shares: Decimal,
    pub price: Price,
    pub fee: Quote,
    pub realized_pnl: Option<Quote>,
    pub requested_at: Timestamp,
}

impl TradeDraft {
    pub fn into_trade(self, account_id: AccountId, sequence: u64, timestamp: Timestamp) -> Trade {
        Trade {
            id: self.id,
            account_id,
            sequence,
            symbol: self.symbol,
            side: self.side,
            shares: self.shares,
            price: self.price,
            fee: self.fee,
            timestamp,
            realized_pnl: self.realized_pnl,
        }
    }
}

// 4.1: roll-up of an account's ledger for the history view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub trade_count: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub total_fees: Quote,
    pub realized_pnl: Quote,
    pub traded_volume: Quote,
}

impl LedgerSummary {
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        trades.into_iter().fold(Self::default(), |mut acc, trade| {
            acc.trade_count += 1;
            match trade.side {
                Side::Buy => acc.buy_count += 1,
                Side::Sell => acc.sell_count += 1,
            }
            acc.total_fees = acc.total_fees.add(trade.fee);
            acc.traded_volume = acc.traded_volume.add(trade.notional());
            if let Some(pnl) = trade.realized_pnl {
                acc.realized_pnl = acc.realized_pnl.add(pnl);
            }
            acc
        })
    }
}

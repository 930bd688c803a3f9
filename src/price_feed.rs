// Price Feed Integration
//
// The settlement core never fetches prices on its own: callers read an oracle and
// pass the execution price in. This module defines the oracle seam and a static,
// in-memory oracle used by the simulator and tests.

use crate::types::{Price, Quote, Symbol};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Current price of one symbol plus the prior session's close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: Symbol,
    pub price: Price,
    pub previous_close: Price,
}

impl PriceQuote {
    pub fn new(symbol: Symbol, price: Price, previous_close: Price) -> Self {
        Self {
            symbol,
            price,
            previous_close,
        }
    }

    /// A quote with no move on the day.
    pub fn flat(symbol: Symbol, price: Price) -> Self {
        Self::new(symbol, price, price)
    }

    pub fn daily_change(&self) -> Quote {
        Quote::new(self.price.value() - self.previous_close.value())
    }

    pub fn daily_change_pct(&self) -> Decimal {
        self.daily_change().value() / self.previous_close.value() * dec!(100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("No price for symbol {0}")]
    UnknownSymbol(Symbol),

    #[error("Price source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only price source. Implementations must be safe to share across threads.
pub trait PriceOracle: Send + Sync {
    fn quote(&self, symbol: &Symbol) -> Result<PriceQuote, OracleError>;

    fn price(&self, symbol: &Symbol) -> Result<Price, OracleError> {
        Ok(self.quote(symbol)?.price)
    }
}

/// Oracle backed by a map the caller fills in.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    quotes: DashMap<Symbol, PriceQuote>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    pub fn set_quote(&self, quote: PriceQuote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Move the price, keeping whatever previous close was recorded.
    pub fn set_price(&self, symbol: &Symbol, price: Price) {
        self.quotes
            .entry(symbol.clone())
            .and_modify(|quote| quote.price = price)
            .or_insert_with(|| PriceQuote::flat(symbol.clone(), price));
    }

    // rolls the session: today's price becomes the previous close
    pub fn close_session(&self) {
        for mut entry in self.quotes.iter_mut() {
            let price = entry.price;
            entry.previous_close = price;
        }
    }

    // delisting: later lookups fail with UnknownSymbol
    pub fn remove(&self, symbol: &Symbol) {
        self.quotes.remove(symbol);
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.quotes.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }
}

impl PriceOracle for StaticPriceOracle {
    fn quote(&self, symbol: &Symbol) -> Result<PriceQuote, OracleError> {
        self.quotes
            .get(symbol)
            .map(|quote| quote.value().clone())
            .ok_or_else(|| OracleError::UnknownSymbol(symbol.clone()))
    }
}

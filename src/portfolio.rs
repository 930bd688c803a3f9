//! Portfolio valuation.
//!
//! Marks an account's holdings to the oracle's current prices. Read-only: the
//! summary is derived from one `AccountView` (account, positions and ledger
//! read together) and never written back.

use crate::account::Account;
use crate::position::Position;
use crate::price_feed::PriceOracle;
use crate::trade::{LedgerSummary, Trade};
use crate::types::{AccountId, Price, Quote, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One holding marked to market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingView {
    pub symbol: Symbol,
    pub shares: Decimal,
    pub cost_basis: Price,
    pub current_price: Option<Price>,
    pub book_value: Quote,
    pub market_value: Quote,
    pub unrealized_pnl: Quote,
    pub daily_pnl: Quote,
    /// False when the oracle had no price; the value fields are then zero.
    pub priced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub account_id: AccountId,
    pub buying_power: Quote,
    pub holdings_value: Quote,
    pub portfolio_value: Quote,
    pub unrealized_pnl: Quote,
    pub daily_pnl: Quote,
    /// Percent of the portfolio value at the previous close.
    pub daily_pnl_pct: Decimal,
    pub realized_pnl: Quote,
    pub holdings: Vec<HoldingView>,
}

impl PortfolioSummary {
    pub fn unpriced_symbols(&self) -> Vec<&Symbol> {
        self.holdings
            .iter()
            .filter(|h| !h.priced)
            .map(|h| &h.symbol)
            .collect()
    }
}

fn value_holding(position: &Position, oracle: &dyn PriceOracle) -> HoldingView {
    match oracle.quote(&position.symbol) {
        Ok(quote) => HoldingView {
            symbol: position.symbol.clone(),
            shares: position.shares,
            cost_basis: position.cost_basis,
            current_price: Some(quote.price),
            book_value: position.book_value(),
            market_value: position.market_value(quote.price),
            unrealized_pnl: position.unrealized_pnl(quote.price),
            daily_pnl: quote.daily_change().mul(position.shares),
            priced: true,
        },
        Err(err) => {
            debug!(symbol = %position.symbol, error = %err, "holding left unpriced");
            HoldingView {
                symbol: position.symbol.clone(),
                shares: position.shares,
                cost_basis: position.cost_basis,
                current_price: None,
                book_value: position.book_value(),
                market_value: Quote::zero(),
                unrealized_pnl: Quote::zero(),
                daily_pnl: Quote::zero(),
                priced: false,
            }
        }
    }
}

pub fn summarize(
    account: &Account,
    positions: &[Position],
    trades: &[Trade],
    oracle: &dyn PriceOracle,
) -> PortfolioSummary {
    let holdings: Vec<HoldingView> = positions.iter().map(|p| value_holding(p, oracle)).collect();

    let holdings_value: Quote = holdings.iter().map(|h| h.market_value).sum();
    let unrealized_pnl: Quote = holdings.iter().map(|h| h.unrealized_pnl).sum();
    let daily_pnl: Quote = holdings.iter().map(|h| h.daily_pnl).sum();
    let portfolio_value = account.buying_power.add(holdings_value);

    let previous_value = portfolio_value.sub(daily_pnl).value();
    let daily_pnl_pct = if previous_value.is_zero() {
        Decimal::ZERO
    } else {
        daily_pnl.value() / previous_value * dec!(100)
    };

    PortfolioSummary {
        account_id: account.id.clone(),
        buying_power: account.buying_power,
        holdings_value,
        portfolio_value,
        unrealized_pnl,
        daily_pnl,
        daily_pnl_pct,
        realized_pnl: LedgerSummary::from_trades(trades).realized_pnl,
        holdings,
    }
}

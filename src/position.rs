// 3.0: held shares of one symbol plus the weighted-average cost basis.
// 3.1 has increase/reduce logic at the bottom. a record only exists while shares > 0.

use crate::types::{Price, Quote, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub shares: Decimal,
    pub cost_basis: Price,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn open(symbol: Symbol, shares: Decimal, price: Price, timestamp: Timestamp) -> Self {
        debug_assert!(shares > Decimal::ZERO, "position must open with positive shares");
        Self {
            symbol,
            shares,
            cost_basis: price,
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    // what was paid for the shares still held, fees excluded
    pub fn book_value(&self) -> Quote {
        Quote::new(self.shares * self.cost_basis.value())
    }

    pub fn market_value(&self, price: Price) -> Quote {
        Quote::new(self.shares * price.value())
    }

    // 3.2: paper gain/loss at the current price
    pub fn unrealized_pnl(&self, price: Price) -> Quote {
        calculate_realized_pnl(self.shares, self.cost_basis, price)
    }
}

// 3.3: the pnl formula. shares * (exit - cost basis). fees are not netted in.
pub fn calculate_realized_pnl(shares: Decimal, cost_basis: Price, exit_price: Price) -> Quote {
    Quote::new((exit_price.value() - cost_basis.value()) * shares)
}

// 3.4: (old_basis*old_shares + qty*price) / (old_shares + qty)
// None when an intermediate product leaves Decimal's range or the basis rounds to zero
pub fn weighted_cost_basis(
    old_shares: Decimal,
    old_basis: Price,
    added_shares: Decimal,
    fill_price: Price,
) -> Option<Price> {
    let total = old_shares.checked_add(added_shares)?;
    if total.is_zero() {
        return Some(fill_price);
    }
    let held = old_shares.checked_mul(old_basis.value())?;
    let bought = added_shares.checked_mul(fill_price.value())?;
    Price::new(held.checked_add(bought)?.checked_div(total)?)
}

/// Result of taking shares out of a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    /// `None` when the sell exhausted the holding.
    pub remaining: Option<Position>,
    pub realized_pnl: Quote,
}

// 3.5: adds shares to an existing holding. reweights the cost basis
pub fn increase_position(
    position: &Position,
    added_shares: Decimal,
    fill_price: Price,
    timestamp: Timestamp,
) -> Option<Position> {
    debug_assert!(added_shares > Decimal::ZERO, "increase amount must be positive");

    Some(Position {
        symbol: position.symbol.clone(),
        shares: position.shares.checked_add(added_shares)?,
        cost_basis: weighted_cost_basis(position.shares, position.cost_basis, added_shares, fill_price)?,
        opened_at: position.opened_at,
        updated_at: timestamp,
    })
}

// 3.6: removes shares. cost basis of what remains is never touched.
// caller has already checked sold_shares <= position.shares. None if the pnl overflows
pub fn reduce_position(
    position: &Position,
    sold_shares: Decimal,
    fill_price: Price,
    timestamp: Timestamp,
) -> Option<PositionUpdate> {
    debug_assert!(sold_shares > Decimal::ZERO, "reduce amount must be positive");
    debug_assert!(sold_shares <= position.shares, "cannot sell more than held");

    let realized_pnl = Quote::new(
        (fill_price.value() - position.cost_basis.value()).checked_mul(sold_shares)?,
    );
    let remaining_shares = position.shares - sold_shares;

    if remaining_shares <= Decimal::ZERO {
        return Some(PositionUpdate {
            remaining: None,
            realized_pnl,
        });
    }

    Some(PositionUpdate {
        remaining: Some(Position {
            symbol: position.symbol.clone(),
            shares: remaining_shares,
            cost_basis: position.cost_basis,
            opened_at: position.opened_at,
            updated_at: timestamp,
        }),
        realized_pnl,
    })
}

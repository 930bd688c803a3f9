//! Order settlement.
//!
//! Every order runs the same cycle: validate the request, read a snapshot of
//! the account and the one position it touches, plan the new state, then ask
//! the store to commit it conditional on the snapshot version. A version
//! conflict re-runs the whole cycle against fresh state.

use super::core::SettlementEngine;
use super::results::{OrderRequest, SettlementError, SettlementResult};
use crate::account::AccountError;
use crate::position::{increase_position, reduce_position, Position};
use crate::price_feed::PriceOracle;
use crate::store::{Commit, PositionWrite, SettlementStore, Snapshot, StoreError};
use crate::trade::{TradeDraft, TradeId};
use crate::types::{AccountId, FeeRate, Price, Quote, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// An order whose inputs have passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ValidatedOrder {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub shares: Decimal,
    pub price: Price,
    pub fee_rate: FeeRate,
}

impl ValidatedOrder {
    fn notional(&self) -> Result<Quote, SettlementError> {
        self.shares
            .checked_mul(self.price.value())
            .map(Quote::new)
            .ok_or_else(|| out_of_range(self.shares, "notional"))
    }
}

/// Writes one settlement would make, plus the figures reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SettlementPlan {
    pub commit: Commit,
    pub notional: Quote,
    pub fee: Quote,
    /// Total cost for buys, net proceeds for sells.
    pub net_value: Quote,
    pub position_after: Option<Position>,
    pub realized_pnl: Option<Quote>,
}

impl<S: SettlementStore> SettlementEngine<S> {
    /// Settles an order at the configured fee rate.
    pub fn execute_order(
        &self,
        account_id: &AccountId,
        symbol: &Symbol,
        side: Side,
        shares: Decimal,
        price: Decimal,
    ) -> Result<SettlementResult, SettlementError> {
        let request = OrderRequest::new(account_id.clone(), symbol.clone(), side, shares, price);
        self.execute_request(&request)
    }

    /// Settles an order at whatever the oracle quotes right now.
    pub fn execute_market_order(
        &self,
        oracle: &dyn PriceOracle,
        account_id: &AccountId,
        symbol: &Symbol,
        side: Side,
        shares: Decimal,
    ) -> Result<SettlementResult, SettlementError> {
        let price = oracle
            .price(symbol)
            .map_err(|e| SettlementError::PriceUnavailable {
                symbol: symbol.clone(),
                reason: e.to_string(),
            })?;
        self.execute_order(account_id, symbol, side, shares, price.value())
    }

    pub fn execute_request(&self, request: &OrderRequest) -> Result<SettlementResult, SettlementError> {
        let order = self.validate(request)?;
        let max_attempts = self.config.max_commit_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            let snapshot = self.read_snapshot(&order)?;
            let plan = plan_settlement(&snapshot, &order, self.clock.now())?;
            let SettlementPlan {
                commit,
                position_after,
                ..
            } = plan;

            match self.store.commit(commit) {
                Ok(receipt) => {
                    info!(
                        account = %order.account_id,
                        symbol = %order.symbol,
                        side = %order.side,
                        shares = %order.shares,
                        price = %order.price,
                        fee = %receipt.trade.fee,
                        buying_power = %receipt.account.buying_power,
                        sequence = receipt.trade.sequence,
                        "order settled"
                    );

                    // the store stamps commit-time timestamps on the position it wrote
                    let position = position_after.map(|mut position| {
                        if snapshot.position.is_none() {
                            position.opened_at = receipt.trade.timestamp;
                        }
                        position.updated_at = receipt.trade.timestamp;
                        position
                    });

                    return Ok(SettlementResult {
                        new_buying_power: receipt.account.buying_power,
                        position,
                        trade: receipt.trade,
                        attempts: attempt,
                    });
                }
                Err(StoreError::Conflict { expected, found }) => {
                    debug!(
                        account = %order.account_id,
                        symbol = %order.symbol,
                        attempt,
                        expected,
                        found,
                        "commit conflict, retrying"
                    );
                }
                Err(other) => return Err(self.store_failure(&order.account_id, other)),
            }
        }

        warn!(
            account = %order.account_id,
            symbol = %order.symbol,
            attempts = max_attempts,
            "commit retries exhausted"
        );
        Err(SettlementError::CommitConflict {
            attempts: max_attempts,
        })
    }

    /// Input checks that need no stored state. Order: symbol, quantity, price,
    /// notional range, fee.
    pub(super) fn validate(&self, request: &OrderRequest) -> Result<ValidatedOrder, SettlementError> {
        if request.symbol.is_empty() {
            return Err(SettlementError::InvalidSymbol);
        }

        if request.shares <= Decimal::ZERO {
            return Err(SettlementError::InvalidQuantity {
                shares: request.shares,
                reason: "must be positive".to_string(),
            });
        }
        if !self.config.fractional_shares && !request.shares.fract().is_zero() {
            return Err(SettlementError::InvalidQuantity {
                shares: request.shares,
                reason: "whole shares only".to_string(),
            });
        }

        let price = Price::new(request.price).ok_or(SettlementError::InvalidPrice(request.price))?;

        // zero means the product underflowed
        match request.shares.checked_mul(price.value()) {
            Some(notional) if notional > Decimal::ZERO => {}
            _ => return Err(out_of_range(request.shares, "notional")),
        }

        let fee_rate = match request.fee_rate {
            Some(rate) => FeeRate::new(rate).ok_or(SettlementError::InvalidFeeRate(rate))?,
            None => self.config.fee_rate,
        };

        Ok(ValidatedOrder {
            account_id: request.account_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            shares: request.shares,
            price,
            fee_rate,
        })
    }

    pub(super) fn read_snapshot(&self, order: &ValidatedOrder) -> Result<Snapshot, SettlementError> {
        self.store
            .snapshot(&order.account_id, &order.symbol)
            .map_err(|e| self.store_failure(&order.account_id, e))
    }
}

/// Works out the post-trade state from a snapshot. Pure: reads nothing, writes nothing.
pub(super) fn plan_settlement(
    snapshot: &Snapshot,
    order: &ValidatedOrder,
    now: Timestamp,
) -> Result<SettlementPlan, SettlementError> {
    match order.side {
        Side::Buy => plan_buy(snapshot, order, now),
        Side::Sell => plan_sell(snapshot, order, now),
    }
}

fn plan_buy(
    snapshot: &Snapshot,
    order: &ValidatedOrder,
    now: Timestamp,
) -> Result<SettlementPlan, SettlementError> {
    let notional = order.notional()?;
    let total_cost = order
        .fee_rate
        .gross_up(notional)
        .ok_or_else(|| out_of_range(order.shares, "notional"))?;
    let fee = total_cost.sub(notional);

    let buying_power = snapshot.account.debited(total_cost).map_err(|e| match e {
        AccountError::InsufficientBuyingPower { required, available } => {
            SettlementError::InsufficientFunds { required, available }
        }
    })?;

    let position = match &snapshot.position {
        Some(existing) => increase_position(existing, order.shares, order.price, now)
            .ok_or_else(|| out_of_range(order.shares, "position"))?,
        None => Position::open(order.symbol.clone(), order.shares, order.price, now),
    };

    Ok(SettlementPlan {
        commit: Commit {
            account_id: order.account_id.clone(),
            expected_version: snapshot.account.version,
            buying_power,
            position: PositionWrite::Upsert(position.clone()),
            trade: draft(order, fee, None, now),
        },
        notional,
        fee,
        net_value: total_cost,
        position_after: Some(position),
        realized_pnl: None,
    })
}

fn plan_sell(
    snapshot: &Snapshot,
    order: &ValidatedOrder,
    now: Timestamp,
) -> Result<SettlementPlan, SettlementError> {
    let held = snapshot
        .position
        .as_ref()
        .ok_or_else(|| SettlementError::NoSuchHolding(order.symbol.clone()))?;

    if order.shares > held.shares {
        return Err(SettlementError::InsufficientShares {
            symbol: order.symbol.clone(),
            requested: order.shares,
            held: held.shares,
        });
    }

    let notional = order.notional()?;
    let net_proceeds = order.fee_rate.net_down(notional);
    let fee = notional.sub(net_proceeds);

    let update = reduce_position(held, order.shares, order.price, now)
        .ok_or_else(|| out_of_range(order.shares, "realized pnl"))?;
    let buying_power = snapshot
        .account
        .credited(net_proceeds)
        .ok_or_else(|| out_of_range(order.shares, "buying power"))?;
    let write = match &update.remaining {
        Some(position) => PositionWrite::Upsert(position.clone()),
        None => PositionWrite::Delete(order.symbol.clone()),
    };

    Ok(SettlementPlan {
        commit: Commit {
            account_id: order.account_id.clone(),
            expected_version: snapshot.account.version,
            buying_power,
            position: write,
            trade: draft(order, fee, Some(update.realized_pnl), now),
        },
        notional,
        fee,
        net_value: net_proceeds,
        position_after: update.remaining,
        realized_pnl: Some(update.realized_pnl),
    })
}

fn out_of_range(shares: Decimal, what: &str) -> SettlementError {
    SettlementError::InvalidQuantity {
        shares,
        reason: format!("{what} out of range"),
    }
}

fn draft(order: &ValidatedOrder, fee: Quote, realized_pnl: Option<Quote>, now: Timestamp) -> TradeDraft {
    TradeDraft {
        id: TradeId::generate(),
        symbol: order.symbol.clone(),
        side: order.side,
        shares: order.shares,
        price: order.price,
        fee,
        realized_pnl,
        requested_at: now,
    }
}

// 8.3: read-only order previews for the trade dialog. same planning path as
// settlement, nothing is committed.

use super::core::SettlementEngine;
use super::results::{OrderQuote, OrderRequest, SettlementError};
use super::settle::plan_settlement;
use crate::store::SettlementStore;
use crate::types::{AccountId, Price, Side, Symbol};
use rust_decimal::Decimal;

impl<S: SettlementStore> SettlementEngine<S> {
    /// What the order would cost or return right now. Fails exactly as
    /// `execute_order` would, without touching the store.
    pub fn preview_order(
        &self,
        account_id: &AccountId,
        symbol: &Symbol,
        side: Side,
        shares: Decimal,
        price: Decimal,
    ) -> Result<OrderQuote, SettlementError> {
        let request = OrderRequest::new(account_id.clone(), symbol.clone(), side, shares, price);
        let order = self.validate(&request)?;
        let snapshot = self.read_snapshot(&order)?;
        let plan = plan_settlement(&snapshot, &order, self.clock.now())?;

        Ok(OrderQuote {
            side,
            symbol: order.symbol,
            shares,
            price: order.price,
            estimated_value: plan.notional,
            fee: plan.fee,
            net_value: plan.net_value,
            buying_power: snapshot.account.buying_power,
            buying_power_after: plan.commit.buying_power,
            held_shares: snapshot.position.map(|p| p.shares).unwrap_or_default(),
            realized_pnl: plan.realized_pnl,
        })
    }

    /// floor(buying_power / (price * (1 + fee))). Whole shares even when
    /// fractional trading is on. A price too extreme to size against the
    /// balance is reported as `InvalidPrice`.
    pub fn max_affordable_shares(&self, account_id: &AccountId, price: Decimal) -> Result<Decimal, SettlementError> {
        let price = Price::new(price).ok_or(SettlementError::InvalidPrice(price))?;
        let account = self.account(account_id)?;

        price
            .value()
            .checked_mul(Decimal::ONE + self.config.fee_rate.value())
            .filter(|per_share| !per_share.is_zero())
            .and_then(|per_share| account.buying_power.value().checked_div(per_share))
            .map(|shares| shares.floor())
            .ok_or(SettlementError::InvalidPrice(price.value()))
    }

    pub fn max_sellable_shares(&self, account_id: &AccountId, symbol: &Symbol) -> Result<Decimal, SettlementError> {
        Ok(self
            .position(account_id, symbol)?
            .map(|p| p.shares)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SettlementConfig;
    use crate::engine::{SettlementEngine, SettlementError};
    use crate::types::{AccountId, Quote, Side, Symbol};
    use rust_decimal_macros::dec;

    fn setup() -> (SettlementEngine, AccountId, Symbol) {
        let engine = SettlementEngine::in_memory(SettlementConfig::default());
        let id = AccountId::new("alice");
        engine.open_account(&id).unwrap();
        (engine, id, Symbol::new("ACME"))
    }

    #[test]
    fn test_buy_preview_matches_settlement() {
        let (engine, id, acme) = setup();
        let quote = engine.preview_order(&id, &acme, Side::Buy, dec!(10), dec!(50)).unwrap();

        assert_eq!(quote.estimated_value.value(), dec!(500));
        assert_eq!(quote.fee.value(), dec!(10));
        assert_eq!(quote.net_value.value(), dec!(510));
        assert_eq!(quote.buying_power_after.value(), dec!(99490));
        assert_eq!(quote.held_shares, dec!(0));

        // preview commits nothing
        assert!(engine.trade_history(&id).unwrap().is_empty());
        assert_eq!(engine.account(&id).unwrap().version, 0);

        let result = engine.execute_order(&id, &acme, Side::Buy, dec!(10), dec!(50)).unwrap();
        assert_eq!(result.new_buying_power, quote.buying_power_after);
    }

    #[test]
    fn test_sell_preview() {
        let (engine, id, acme) = setup();
        engine.execute_order(&id, &acme, Side::Buy, dec!(20), dec!(60)).unwrap();

        let quote = engine.preview_order(&id, &acme, Side::Sell, dec!(20), dec!(80)).unwrap();
        assert_eq!(quote.net_value.value(), dec!(1568));
        assert_eq!(quote.fee.value(), dec!(32));
        assert_eq!(quote.held_shares, dec!(20));
        assert_eq!(quote.realized_pnl, Some(Quote::new(dec!(400))));
    }

    #[test]
    fn test_preview_reports_rejection() {
        let (engine, id, acme) = setup();
        let err = engine.preview_order(&id, &acme, Side::Sell, dec!(1), dec!(80)).unwrap_err();
        assert_eq!(err, SettlementError::NoSuchHolding(acme));
    }

    #[test]
    fn test_max_affordable_shares() {
        let (engine, id, _) = setup();
        // 100000 / 51 = 1960.78...
        assert_eq!(engine.max_affordable_shares(&id, dec!(50)).unwrap(), dec!(1960));
        assert!(matches!(
            engine.max_affordable_shares(&id, dec!(-1)),
            Err(SettlementError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_max_affordable_at_extreme_prices() {
        let (engine, id, _) = setup();
        let huge = dec!(79000000000000000000000000000);
        let tiny = dec!(0.0000000000000000000000000001);

        assert_eq!(engine.max_affordable_shares(&id, huge), Err(SettlementError::InvalidPrice(huge)));
        assert_eq!(engine.max_affordable_shares(&id, tiny), Err(SettlementError::InvalidPrice(tiny)));
        assert_eq!(engine.max_affordable_shares(&id, dec!(1000000)).unwrap(), dec!(0));
    }

    #[test]
    fn test_max_affordable_is_affordable() {
        let (engine, id, acme) = setup();
        let max = engine.max_affordable_shares(&id, dec!(50)).unwrap();
        assert!(engine.execute_order(&id, &acme, Side::Buy, max, dec!(50)).is_ok());
        assert!(matches!(
            engine.execute_order(&id, &acme, Side::Buy, dec!(1), dec!(50)),
            Err(SettlementError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_max_sellable_shares() {
        let (engine, id, acme) = setup();
        assert_eq!(engine.max_sellable_shares(&id, &acme).unwrap(), dec!(0));
        engine.execute_order(&id, &acme, Side::Buy, dec!(7), dec!(10)).unwrap();
        assert_eq!(engine.max_sellable_shares(&id, &acme).unwrap(), dec!(7));
    }
}

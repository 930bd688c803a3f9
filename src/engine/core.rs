// 8.0 engine/core.rs: the engine struct, account lifecycle and read-side queries.

use super::results::SettlementError;
use crate::account::Account;
use crate::config::SettlementConfig;
use crate::portfolio::{summarize, PortfolioSummary};
use crate::position::Position;
use crate::price_feed::PriceOracle;
use crate::store::{InMemoryStore, SettlementStore, StoreError};
use crate::trade::{LedgerSummary, Trade};
use crate::types::{AccountId, Clock, Symbol, SystemClock};
use std::sync::Arc;
use tracing::{info, warn};

/** 8.1: settlement engine. holds no account state itself; everything lives in the store */
pub struct SettlementEngine<S: SettlementStore = InMemoryStore> {
    pub(super) config: SettlementConfig,
    pub(super) store: S,
    pub(super) clock: Arc<dyn Clock>,
}

impl SettlementEngine<InMemoryStore> {
    pub fn in_memory(config: SettlementConfig) -> Self {
        Self::new(config, InMemoryStore::new())
    }
}

impl<S: SettlementStore> SettlementEngine<S> {
    pub fn new(config: SettlementConfig, store: S) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new account funded with the configured initial buying power.
    pub fn open_account(&self, account_id: &AccountId) -> Result<Account, SettlementError> {
        let account = Account::new(
            account_id.clone(),
            self.config.initial_buying_power,
            self.clock.now(),
        );
        self.store
            .open_account(account.clone())
            .map_err(|e| self.store_failure(account_id, e))?;

        info!(
            account = %account_id,
            buying_power = %account.buying_power,
            "account opened"
        );
        Ok(account)
    }

    /// Administrative reset: initial buying power, no positions, empty ledger.
    /// Any settlement prepared against the old state will conflict.
    pub fn reset_account(&self, account_id: &AccountId) -> Result<Account, SettlementError> {
        let account = self
            .store
            .reset_account(account_id, self.config.initial_buying_power, self.clock.now())
            .map_err(|e| self.store_failure(account_id, e))?;

        info!(
            account = %account_id,
            buying_power = %account.buying_power,
            version = account.version,
            "account reset"
        );
        Ok(account)
    }

    pub fn account(&self, account_id: &AccountId) -> Result<Account, SettlementError> {
        self.store
            .account(account_id)
            .map_err(|e| self.store_failure(account_id, e))
    }

    pub fn positions(&self, account_id: &AccountId) -> Result<Vec<Position>, SettlementError> {
        self.store
            .positions(account_id)
            .map_err(|e| self.store_failure(account_id, e))
    }

    pub fn position(
        &self,
        account_id: &AccountId,
        symbol: &Symbol,
    ) -> Result<Option<Position>, SettlementError> {
        self.store
            .position(account_id, symbol)
            .map_err(|e| self.store_failure(account_id, e))
    }

    /// Full ledger, oldest first.
    pub fn trade_history(&self, account_id: &AccountId) -> Result<Vec<Trade>, SettlementError> {
        self.store
            .trades(account_id)
            .map_err(|e| self.store_failure(account_id, e))
    }

    /// Newest first. `None` uses the configured page size.
    pub fn recent_trades(
        &self,
        account_id: &AccountId,
        limit: Option<usize>,
    ) -> Result<Vec<Trade>, SettlementError> {
        let limit = limit.unwrap_or(self.config.recent_trades_limit);
        let trades = self.trade_history(account_id)?;
        Ok(trades.into_iter().rev().take(limit).collect())
    }

    pub fn ledger_summary(&self, account_id: &AccountId) -> Result<LedgerSummary, SettlementError> {
        let trades = self.trade_history(account_id)?;
        Ok(LedgerSummary::from_trades(&trades))
    }

    pub fn portfolio_summary(
        &self,
        account_id: &AccountId,
        oracle: &dyn PriceOracle,
    ) -> Result<PortfolioSummary, SettlementError> {
        let view = self
            .store
            .account_view(account_id)
            .map_err(|e| self.store_failure(account_id, e))?;
        Ok(summarize(&view.account, &view.positions, &view.trades, oracle))
    }

    pub(super) fn store_failure(&self, account_id: &AccountId, err: StoreError) -> SettlementError {
        if let StoreError::Unavailable(reason) = &err {
            warn!(account = %account_id, reason = %reason, "settlement store unavailable");
        }
        SettlementError::from(err)
    }
}

//! In-memory settlement store.
//!
//! Each account's records live together in one `AccountBook` inside a
//! `DashMap`. Commits take the shard write guard for that account, check the
//! version, and apply all writes before releasing it, so concurrent commits on
//! one account serialize while different accounts proceed in parallel.

use super::{AccountView, Commit, CommitReceipt, PositionWrite, SettlementStore, Snapshot, StoreError};
use crate::account::Account;
use crate::position::Position;
use crate::trade::Trade;
use crate::types::{AccountId, Quote, Symbol, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct AccountBook {
    account: Account,
    positions: BTreeMap<Symbol, Position>,
    trades: Vec<Trade>,
}

impl AccountBook {
    fn new(account: Account) -> Self {
        Self {
            account,
            positions: BTreeMap::new(),
            trades: Vec::new(),
        }
    }

    // strictly increasing per account, even if the wall clock stalls or steps back
    fn next_trade_timestamp(&self, requested: Timestamp) -> Timestamp {
        match self.trades.last() {
            Some(last) if last.timestamp >= requested => last.timestamp.next_millis(),
            _ => requested,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    books: DashMap<AccountId, AccountBook>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
        }
    }
}

impl SettlementStore for InMemoryStore {
    fn open_account(&self, account: Account) -> Result<(), StoreError> {
        match self.books.entry(account.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(account.id)),
            Entry::Vacant(slot) => {
                slot.insert(AccountBook::new(account));
                Ok(())
            }
        }
    }

    fn snapshot(&self, account_id: &AccountId, symbol: &Symbol) -> Result<Snapshot, StoreError> {
        let book = self
            .books
            .get(account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.clone()))?;

        Ok(Snapshot {
            account: book.account.clone(),
            position: book.positions.get(symbol).cloned(),
        })
    }

    fn commit(&self, commit: Commit) -> Result<CommitReceipt, StoreError> {
        let mut book = self
            .books
            .get_mut(&commit.account_id)
            .ok_or_else(|| StoreError::NotFound(commit.account_id.clone()))?;

        if book.account.version != commit.expected_version {
            return Err(StoreError::Conflict {
                expected: commit.expected_version,
                found: book.account.version,
            });
        }

        debug_assert!(!commit.buying_power.is_negative(), "engine must never commit a negative balance");

        // nothing below can fail, so the book is never left half-written
        let timestamp = book.next_trade_timestamp(commit.trade.requested_at);
        let sequence = book.trades.len() as u64 + 1;

        match commit.position {
            PositionWrite::Upsert(mut position) => {
                if !book.positions.contains_key(&position.symbol) {
                    position.opened_at = timestamp;
                }
                position.updated_at = timestamp;
                book.positions.insert(position.symbol.clone(), position);
            }
            PositionWrite::Delete(symbol) => {
                book.positions.remove(&symbol);
            }
        }

        let trade = commit.trade.into_trade(commit.account_id.clone(), sequence, timestamp);
        book.trades.push(trade.clone());

        book.account.buying_power = commit.buying_power;
        book.account.updated_at = timestamp;
        book.account.version += 1;

        Ok(CommitReceipt {
            account: book.account.clone(),
            trade,
        })
    }

    fn reset_account(
        &self,
        account_id: &AccountId,
        initial_buying_power: Quote,
        at: Timestamp,
    ) -> Result<Account, StoreError> {
        let mut book = self
            .books
            .get_mut(account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.clone()))?;

        book.positions.clear();
        book.trades.clear();
        book.account.buying_power = initial_buying_power;
        book.account.updated_at = at;
        book.account.version += 1;

        Ok(book.account.clone())
    }

    fn account(&self, account_id: &AccountId) -> Result<Account, StoreError> {
        self.books
            .get(account_id)
            .map(|book| book.account.clone())
            .ok_or_else(|| StoreError::NotFound(account_id.clone()))
    }

    fn positions(&self, account_id: &AccountId) -> Result<Vec<Position>, StoreError> {
        self.books
            .get(account_id)
            .map(|book| book.positions.values().cloned().collect())
            .ok_or_else(|| StoreError::NotFound(account_id.clone()))
    }

    fn trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError> {
        self.books
            .get(account_id)
            .map(|book| book.trades.clone())
            .ok_or_else(|| StoreError::NotFound(account_id.clone()))
    }

    fn account_view(&self, account_id: &AccountId) -> Result<AccountView, StoreError> {
        let book = self
            .books
            .get(account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.clone()))?;

        Ok(AccountView {
            account: book.account.clone(),
            positions: book.positions.values().cloned().collect(),
            trades: book.trades.clone(),
        })
    }
}

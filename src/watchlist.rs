// 12.0: per-account named watchlists. plain symbol sets, no relation to holdings
// and outside the settlement commit path.

use crate::types::{AccountId, Symbol, Timestamp};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchlistId(pub Uuid);

impl WatchlistId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WatchlistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    pub id: WatchlistId,
    pub account_id: AccountId,
    pub name: String,
    /// Insertion order, no duplicates.
    pub symbols: Vec<Symbol>,
    pub created_at: Timestamp,
}

impl Watchlist {
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchlistError {
    #[error("Watchlist name cannot be empty")]
    EmptyName,

    #[error("Symbol must not be empty")]
    InvalidSymbol,

    #[error("Watchlist {0} not found")]
    NotFound(WatchlistId),
}

#[derive(Debug, Default)]
pub struct WatchlistStore {
    lists: DashMap<AccountId, BTreeMap<WatchlistId, Watchlist>>,
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self {
            lists: DashMap::new(),
        }
    }

    pub fn create(&self, account_id: &AccountId, name: &str, at: Timestamp) -> Result<Watchlist, WatchlistError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WatchlistError::EmptyName);
        }

        let watchlist = Watchlist {
            id: WatchlistId::generate(),
            account_id: account_id.clone(),
            name: name.to_string(),
            symbols: Vec::new(),
            created_at: at,
        };
        self.lists
            .entry(account_id.clone())
            .or_default()
            .insert(watchlist.id, watchlist.clone());

        info!(account = %account_id, watchlist = %watchlist.id, name = %watchlist.name, "watchlist created");
        Ok(watchlist)
    }

    /// Set-union: adding a symbol already present is a no-op.
    pub fn add_symbol(
        &self,
        account_id: &AccountId,
        id: WatchlistId,
        symbol: &Symbol,
    ) -> Result<Watchlist, WatchlistError> {
        if symbol.is_empty() {
            return Err(WatchlistError::InvalidSymbol);
        }
        self.update(account_id, id, |list| {
            if !list.contains(symbol) {
                list.symbols.push(symbol.clone());
            }
        })
    }

    pub fn remove_symbol(
        &self,
        account_id: &AccountId,
        id: WatchlistId,
        symbol: &Symbol,
    ) -> Result<Watchlist, WatchlistError> {
        self.update(account_id, id, |list| list.symbols.retain(|s| s != symbol))
    }

    pub fn delete(&self, account_id: &AccountId, id: WatchlistId) -> Result<(), WatchlistError> {
        let removed = self
            .lists
            .get_mut(account_id)
            .and_then(|mut lists| lists.remove(&id));

        match removed {
            Some(list) => {
                info!(account = %account_id, watchlist = %id, name = %list.name, "watchlist deleted");
                Ok(())
            }
            None => Err(WatchlistError::NotFound(id)),
        }
    }

    pub fn get(&self, account_id: &AccountId, id: WatchlistId) -> Result<Watchlist, WatchlistError> {
        self.lists
            .get(account_id)
            .and_then(|lists| lists.get(&id).cloned())
            .ok_or(WatchlistError::NotFound(id))
    }

    /// Oldest first.
    pub fn list(&self, account_id: &AccountId) -> Vec<Watchlist> {
        let mut lists: Vec<Watchlist> = self
            .lists
            .get(account_id)
            .map(|lists| lists.values().cloned().collect())
            .unwrap_or_default();
        lists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        lists
    }

    /// Every symbol on any of the account's lists, once each, sorted.
    pub fn all_symbols(&self, account_id: &AccountId) -> Vec<Symbol> {
        let Some(lists) = self.lists.get(account_id) else {
            return Vec::new();
        };
        let distinct: BTreeSet<Symbol> = lists
            .values()
            .flat_map(|list| list.symbols.iter().cloned())
            .collect();
        distinct.into_iter().collect()
    }

    fn update(
        &self,
        account_id: &AccountId,
        id: WatchlistId,
        apply: impl FnOnce(&mut Watchlist),
    ) -> Result<Watchlist, WatchlistError> {
        let mut lists = self
            .lists
            .get_mut(account_id)
            .ok_or(WatchlistError::NotFound(id))?;
        let list = lists.get_mut(&id).ok_or(WatchlistError::NotFound(id))?;
        apply(list);
        Ok(list.clone())
    }
}

// 5.0: storage seam. the engine reads a consistent snapshot, then asks the store to
// commit account + position + trade as one unit, conditional on the snapshot version.

mod memory;

pub use memory::InMemoryStore;

use crate::account::Account;
use crate::position::Position;
use crate::trade::{Trade, TradeDraft};
use crate::types::{AccountId, Quote, Symbol, Timestamp};

/// What the engine sees before validating an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub account: Account,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionWrite {
    Upsert(Position),
    Delete(Symbol),
}

/// Account, positions and ledger as of one instant. No commit lands between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub account: Account,
    pub positions: Vec<Position>,
    pub trades: Vec<Trade>,
}

/// One settlement's worth of writes. Applied entirely or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub account_id: AccountId,
    pub expected_version: u64,
    pub buying_power: Quote,
    pub position: PositionWrite,
    pub trade: TradeDraft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub account: Account,
    pub trade: Trade,
}

/// Capabilities the settlement engine needs from persistence.
///
/// Implementations must make `commit` and `reset_account` atomic per account:
/// either every write lands and the version advances, or nothing changes.
pub trait SettlementStore: Send + Sync {
    fn open_account(&self, account: Account) -> Result<(), StoreError>;

    fn snapshot(&self, account_id: &AccountId, symbol: &Symbol) -> Result<Snapshot, StoreError>;

    fn commit(&self, commit: Commit) -> Result<CommitReceipt, StoreError>;

    fn reset_account(
        &self,
        account_id: &AccountId,
        initial_buying_power: Quote,
        at: Timestamp,
    ) -> Result<Account, StoreError>;

    fn account(&self, account_id: &AccountId) -> Result<Account, StoreError>;

    fn positions(&self, account_id: &AccountId) -> Result<Vec<Position>, StoreError>;

    fn trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError>;

    /// All three records under one read, for callers that combine them.
    fn account_view(&self, account_id: &AccountId) -> Result<AccountView, StoreError>;

    fn position(&self, account_id: &AccountId, symbol: &Symbol) -> Result<Option<Position>, StoreError> {
        Ok(self.snapshot(account_id, symbol)?.position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Account {0} not found")]
    NotFound(AccountId),

    #[error("Account {0} already exists")]
    AlreadyExists(AccountId),

    #[error("Version conflict: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

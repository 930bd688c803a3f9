// papertrade-core: trade settlement for a paper-trading platform.
// every buy or sell moves cash, holdings and the trade ledger together or not at all.
// exact decimal money throughout; no floats anywhere near a balance.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, Symbol, Side, Price, Quote, FeeRate, Clock
//   2.x  account.rs: account record + buying power debit/credit
//   3.x  position.rs: holdings, weighted cost basis, realized/unrealized pnl
//   4.x  trade.rs: immutable ledger entries + ledger roll-up
//   5.x  store/: storage seam, versioned commits, in-memory store
//   7.x  config.rs: starting cash, fees, retry budget, env presets
//   8.x  engine/: settlement engine: validate, plan, commit, retry, previews
//   9.x  price_feed.rs: price oracle seam + static oracle
//   10.x portfolio.rs: mark-to-market valuation (read-only)
//   12.x watchlist.rs: named per-account symbol lists

// core settlement modules
pub mod account;
pub mod engine;
pub mod position;
pub mod store;
pub mod trade;
pub mod types;

// read side and integration modules
pub mod config;
pub mod portfolio;
pub mod price_feed;
pub mod watchlist;

// re exports for convenience
pub use account::*;
pub use engine::*;
pub use position::*;
pub use trade::*;
pub use types::*;
pub use config::{ConfigError, Environment, SettlementConfig};
pub use portfolio::{HoldingView, PortfolioSummary};
pub use price_feed::{OracleError, PriceOracle, PriceQuote, StaticPriceOracle};
pub use store::{
    AccountView, Commit, CommitReceipt, InMemoryStore, PositionWrite, SettlementStore, Snapshot, StoreError,
};
pub use watchlist::{Watchlist, WatchlistError, WatchlistId, WatchlistStore};

// 8.0: settlement engine. validates orders, plans the post-trade state and commits
// account + position + trade through the store as one unit, retrying on version
// conflicts. no I/O of its own beyond the store and the clock.

mod core;
mod quote;
mod results;
mod settle;

pub use core::SettlementEngine;
pub use results::{ErrorKind, ErrorResponse, OrderQuote, OrderRequest, SettlementError, SettlementResult};

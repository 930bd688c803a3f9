//! Stress tests
//!
//! Concurrent callers against one account and many accounts, plus stores that
//! inject version conflicts and outages, to verify no settlement is ever lost,
//! doubled or half-applied.

use papertrade_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

fn contended_config(initial: Decimal) -> SettlementConfig {
    SettlementConfig {
        max_commit_retries: 10_000,
        ..SettlementConfig::legacy().with_initial_buying_power(Quote::new(initial))
    }
}

/// Many threads hitting the real in-memory store.
mod concurrency_tests {
    use super::*;

    #[test]
    fn racing_buys_cannot_overdraw() {
        for _ in 0..50 {
            let engine = Arc::new(SettlementEngine::in_memory(contended_config(dec!(1000))));
            let id = AccountId::new("racer");
            engine.open_account(&id).unwrap();

            let outcomes: Vec<Result<SettlementResult, SettlementError>> = thread::scope(|s| {
                let handles: Vec<_> = ["ACME", "GLOBEX"]
                    .into_iter()
                    .map(|ticker| {
                        let engine = &engine;
                        let id = &id;
                        s.spawn(move || engine.execute_order(id, &Symbol::new(ticker), Side::Buy, dec!(6), dec!(100)))
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let filled = outcomes.iter().filter(|o| o.is_ok()).count();
            assert_eq!(filled, 1);
            assert!(outcomes
                .iter()
                .any(|o| matches!(o, Err(SettlementError::InsufficientFunds { .. }))));

            assert_eq!(engine.account(&id).unwrap().buying_power.value(), dec!(400));
            assert_eq!(engine.trade_history(&id).unwrap().len(), 1);
            assert_eq!(engine.positions(&id).unwrap().len(), 1);
        }
    }

    #[test]
    fn many_writers_one_account() {
        let engine = Arc::new(SettlementEngine::in_memory(contended_config(dec!(1_000_000))));
        let id = AccountId::new("busy");
        let acme = Symbol::new("ACME");
        engine.open_account(&id).unwrap();

        let threads = 8;
        let orders_per_thread = 50;

        thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    for _ in 0..orders_per_thread {
                        engine.execute_order(&id, &acme, Side::Buy, dec!(1), dec!(10)).unwrap();
                    }
                });
            }
        });

        let total = (threads * orders_per_thread) as u64;
        let trades = engine.trade_history(&id).unwrap();
        assert_eq!(trades.len() as u64, total);

        let seqs: Vec<u64> = trades.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, (1..=total).collect::<Vec<_>>());
        assert!(trades.windows(2).all(|w| w[1].timestamp > w[0].timestamp));

        let position = engine.position(&id, &acme).unwrap().unwrap();
        assert_eq!(position.shares, Decimal::from(total));
        assert_eq!(position.cost_basis.value(), dec!(10));
        assert_eq!(
            engine.account(&id).unwrap().buying_power.value(),
            dec!(1_000_000) - Decimal::from(total) * dec!(10)
        );
    }

    #[test]
    fn racing_sells_never_oversell() {
        let engine = Arc::new(SettlementEngine::in_memory(contended_config(dec!(10_000))));
        let id = AccountId::new("seller");
        let acme = Symbol::new("ACME");
        engine.open_account(&id).unwrap();
        engine.execute_order(&id, &acme, Side::Buy, dec!(10), dec!(100)).unwrap();

        let outcomes: Vec<Result<SettlementResult, SettlementError>> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| engine.execute_order(&id, &acme, Side::Sell, dec!(5), dec!(120))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 2);
        for outcome in outcomes.iter().filter_map(|o| o.as_ref().err()) {
            assert!(matches!(
                outcome.kind(),
                ErrorKind::InsufficientShares | ErrorKind::NoSuchHolding
            ));
        }
        assert!(engine.position(&id, &acme).unwrap().is_none());
        // 10000 - 1000 + 2 * 600
        assert_eq!(engine.account(&id).unwrap().buying_power.value(), dec!(10200));
    }

    #[test]
    fn portfolio_reads_see_whole_settlements() {
        let engine = SettlementEngine::in_memory(contended_config(dec!(10_000)));
        let oracle = StaticPriceOracle::new();
        let id = AccountId::new("watcher");
        let acme = Symbol::new("ACME");
        oracle.set_price(&acme, Price::new_unchecked(dec!(10)));
        engine.open_account(&id).unwrap();

        // fee-free trades at the marked price move value between cash and holdings, never in or out
        thread::scope(|s| {
            s.spawn(|| {
                for round in 0..200 {
                    let side = if round % 3 == 2 { Side::Sell } else { Side::Buy };
                    engine.execute_order(&id, &acme, side, dec!(1), dec!(10)).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..200 {
                    let summary = engine.portfolio_summary(&id, &oracle).unwrap();
                    assert_eq!(summary.portfolio_value.value(), dec!(10_000));
                    assert_eq!(summary.realized_pnl, Quote::zero());
                }
            });
        });

        assert_eq!(engine.trade_history(&id).unwrap().len(), 200);
    }

    #[test]
    fn independent_accounts_do_not_contend() {
        let engine = Arc::new(SettlementEngine::in_memory(SettlementConfig::default()));
        let ids: Vec<AccountId> = (0..16).map(|i| AccountId::new(format!("user-{i}"))).collect();
        for id in &ids {
            engine.open_account(id).unwrap();
        }

        thread::scope(|s| {
            for id in &ids {
                let engine = &engine;
                s.spawn(move || {
                    let acme = Symbol::new("ACME");
                    for _ in 0..25 {
                        let result = engine.execute_order(id, &acme, Side::Buy, dec!(2), dec!(25)).unwrap();
                        assert_eq!(result.attempts, 1);
                    }
                    engine.execute_order(id, &acme, Side::Sell, dec!(50), dec!(25)).unwrap();
                });
            }
        });

        for id in &ids {
            // 25 buys of 51 each, one sell returning 1225
            assert_eq!(engine.account(id).unwrap().buying_power.value(), dec!(99950));
            assert_eq!(engine.trade_history(id).unwrap().len(), 26);
            assert!(engine.positions(id).unwrap().is_empty());
        }
    }
}

/// Stores that misbehave on purpose.
mod injected_failure_tests {
    use super::*;

    /// Lets a competing commit land right before the engine's own commit.
    struct RacingStore {
        inner: InMemoryStore,
        competitor: Mutex<Option<Commit>>,
    }

    impl SettlementStore for RacingStore {
        fn open_account(&self, account: Account) -> Result<(), StoreError> {
            self.inner.open_account(account)
        }

        fn snapshot(&self, account_id: &AccountId, symbol: &Symbol) -> Result<Snapshot, StoreError> {
            self.inner.snapshot(account_id, symbol)
        }

        fn commit(&self, commit: Commit) -> Result<CommitReceipt, StoreError> {
            let competitor = self.competitor.lock().unwrap().take();
            if let Some(competitor) = competitor {
                self.inner.commit(competitor)?;
            }
            self.inner.commit(commit)
        }

        fn reset_account(&self, account_id: &AccountId, initial: Quote, at: Timestamp) -> Result<Account, StoreError> {
            self.inner.reset_account(account_id, initial, at)
        }

        fn account(&self, account_id: &AccountId) -> Result<Account, StoreError> {
            self.inner.account(account_id)
        }

        fn positions(&self, account_id: &AccountId) -> Result<Vec<Position>, StoreError> {
            self.inner.positions(account_id)
        }

        fn trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError> {
            self.inner.trades(account_id)
        }

        fn account_view(&self, account_id: &AccountId) -> Result<AccountView, StoreError> {
            self.inner.account_view(account_id)
        }
    }

    /// Rejects a fixed number of commits as stale, or fails them outright while `down` is set.
    struct FlakyStore {
        inner: InMemoryStore,
        conflicts_left: AtomicU32,
        down: AtomicBool,
    }

    impl FlakyStore {
        fn new(conflicts: u32) -> Self {
            Self {
                inner: InMemoryStore::new(),
                conflicts_left: AtomicU32::new(conflicts),
                down: AtomicBool::new(false),
            }
        }
    }

    impl SettlementStore for FlakyStore {
        fn open_account(&self, account: Account) -> Result<(), StoreError> {
            self.inner.open_account(account)
        }

        fn snapshot(&self, account_id: &AccountId, symbol: &Symbol) -> Result<Snapshot, StoreError> {
            self.inner.snapshot(account_id, symbol)
        }

        fn commit(&self, commit: Commit) -> Result<CommitReceipt, StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            let injected = self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StoreError::Conflict {
                    expected: commit.expected_version,
                    found: commit.expected_version + 1,
                });
            }
            self.inner.commit(commit)
        }

        fn reset_account(&self, account_id: &AccountId, initial: Quote, at: Timestamp) -> Result<Account, StoreError> {
            self.inner.reset_account(account_id, initial, at)
        }

        fn account(&self, account_id: &AccountId) -> Result<Account, StoreError> {
            self.inner.account(account_id)
        }

        fn positions(&self, account_id: &AccountId) -> Result<Vec<Position>, StoreError> {
            self.inner.positions(account_id)
        }

        fn trades(&self, account_id: &AccountId) -> Result<Vec<Trade>, StoreError> {
            self.inner.trades(account_id)
        }

        fn account_view(&self, account_id: &AccountId) -> Result<AccountView, StoreError> {
            self.inner.account_view(account_id)
        }
    }

    fn competing_buy(id: &AccountId, version: u64, buying_power: Decimal) -> Commit {
        let globex = Symbol::new("GLOBEX");
        let price = Price::new_unchecked(dec!(100));
        Commit {
            account_id: id.clone(),
            expected_version: version,
            buying_power: Quote::new(buying_power),
            position: PositionWrite::Upsert(Position::open(globex.clone(), dec!(6), price, Timestamp(0))),
            trade: TradeDraft {
                id: TradeId::generate(),
                symbol: globex,
                side: Side::Buy,
                shares: dec!(6),
                price,
                fee: Quote::zero(),
                realized_pnl: None,
                requested_at: Timestamp(0),
            },
        }
    }

    #[test]
    fn retry_revalidates_against_fresh_state() {
        let id = AccountId::new("racer");
        let store = RacingStore {
            inner: InMemoryStore::new(),
            competitor: Mutex::new(None),
        };
        let engine = SettlementEngine::new(SettlementConfig::legacy().with_initial_buying_power(Quote::new(dec!(1000))), store);
        engine.open_account(&id).unwrap();

        // another writer spends 600 between our snapshot and our commit
        *engine.store().competitor.lock().unwrap() = Some(competing_buy(&id, 0, dec!(400)));

        let err = engine
            .execute_order(&id, &Symbol::new("ACME"), Side::Buy, dec!(6), dec!(100))
            .unwrap_err();

        assert_eq!(
            err,
            SettlementError::InsufficientFunds {
                required: Quote::new(dec!(600)),
                available: Quote::new(dec!(400)),
            }
        );
        let trades = engine.trade_history(&id).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].symbol, Symbol::new("GLOBEX"));
    }

    #[test]
    fn retry_succeeds_when_still_valid() {
        let id = AccountId::new("racer");
        let store = RacingStore {
            inner: InMemoryStore::new(),
            competitor: Mutex::new(None),
        };
        let engine = SettlementEngine::new(SettlementConfig::legacy().with_initial_buying_power(Quote::new(dec!(2000))), store);
        engine.open_account(&id).unwrap();
        *engine.store().competitor.lock().unwrap() = Some(competing_buy(&id, 0, dec!(1400)));

        let result = engine
            .execute_order(&id, &Symbol::new("ACME"), Side::Buy, dec!(6), dec!(100))
            .unwrap();

        assert_eq!(result.attempts, 2);
        assert_eq!(result.new_buying_power.value(), dec!(800));
        assert_eq!(result.trade.sequence, 2);
    }

    #[test]
    fn conflicts_within_budget_are_absorbed() {
        let config = SettlementConfig {
            max_commit_retries: 3,
            ..SettlementConfig::default()
        };
        let engine = SettlementEngine::new(config, FlakyStore::new(3));
        let id = AccountId::new("flaky");
        engine.open_account(&id).unwrap();

        let result = engine
            .execute_order(&id, &Symbol::new("ACME"), Side::Buy, dec!(10), dec!(50))
            .unwrap();

        assert_eq!(result.attempts, 4);
        assert_eq!(result.new_buying_power.value(), dec!(99490));
        assert_eq!(engine.trade_history(&id).unwrap().len(), 1);
    }

    #[test]
    fn exhausted_retries_surface_commit_conflict() {
        let config = SettlementConfig {
            max_commit_retries: 2,
            ..SettlementConfig::default()
        };
        let engine = SettlementEngine::new(config, FlakyStore::new(u32::MAX));
        let id = AccountId::new("flaky");
        engine.open_account(&id).unwrap();
        let before = engine.account(&id).unwrap();

        let err = engine
            .execute_order(&id, &Symbol::new("ACME"), Side::Buy, dec!(10), dec!(50))
            .unwrap_err();

        assert_eq!(err, SettlementError::CommitConflict { attempts: 3 });
        assert!(err.is_retryable());
        assert_eq!(engine.account(&id).unwrap(), before);
        assert!(engine.positions(&id).unwrap().is_empty());
        assert!(engine.trade_history(&id).unwrap().is_empty());
    }

    #[test]
    fn outage_is_reported_and_not_retried() {
        let engine = SettlementEngine::new(SettlementConfig::default(), FlakyStore::new(0));
        let id = AccountId::new("offline");
        engine.open_account(&id).unwrap();
        engine.store().down.store(true, Ordering::SeqCst);

        let err = engine
            .execute_order(&id, &Symbol::new("ACME"), Side::Buy, dec!(1), dec!(10))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.is_retryable());
        assert_eq!(engine.account(&id).unwrap().version, 0);

        engine.store().down.store(false, Ordering::SeqCst);
        let result = engine
            .execute_order(&id, &Symbol::new("ACME"), Side::Buy, dec!(1), dec!(10))
            .unwrap();
        assert_eq!(result.attempts, 1);
    }
}

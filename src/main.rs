//! Paper-trading settlement simulation.
//!
//! Walks the settlement engine through the account lifecycle: buys, cost-basis
//! averaging, partial and full sells, rejected orders, concurrent buyers,
//! resets and portfolio valuation. Engine logs go through `tracing`; set
//! `RUST_LOG=debug` to see commit retries.

use papertrade_core::*;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

type SimResult = Result<(), Box<dyn Error>>;

fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    println!("Paper Trading Settlement Simulation");
    println!("Fee-aware settlement, weighted cost basis, optimistic commits\n");

    scenario_1_buy_average_sell()?;
    scenario_2_previews_and_limits()?;
    scenario_3_rejections()?;
    scenario_4_concurrent_buyers()?;
    scenario_5_reset()?;
    scenario_6_portfolio_and_watchlists()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// Buy twice at different prices, then sell everything.
fn scenario_1_buy_average_sell() -> SimResult {
    println!("Scenario 1: Buy, Average Up, Sell Out\n");

    let engine = SettlementEngine::in_memory(SettlementConfig::default());
    let alice = AccountId::new("alice");
    let acme = Symbol::new("ACME");
    engine.open_account(&alice)?;

    let first = engine.execute_order(&alice, &acme, Side::Buy, dec!(10), dec!(50))?;
    println!("  BUY 10 ACME @ $50, fee ${}, settled {}", first.trade.fee, first.trade.timestamp.to_rfc3339());
    println!("  Buying power: ${}", first.new_buying_power);

    let second = engine.execute_order(&alice, &acme, Side::Buy, dec!(10), dec!(70))?;
    if let Some(position) = &second.position {
        println!("  BUY 10 ACME @ $70, now {} shares @ ${} basis", position.shares, position.cost_basis);
    }

    let sell = engine.execute_order(&alice, &acme, Side::Sell, dec!(20), dec!(80))?;
    println!("  SELL 20 ACME @ $80, fee ${}", sell.trade.fee);
    println!(
        "  Realized P/L: ${}, position open: {}",
        sell.realized_pnl().unwrap_or_default(),
        sell.position.is_some()
    );

    let summary = engine.ledger_summary(&alice)?;
    println!(
        "  Ledger: {} trades, ${} fees, buying power ${}\n",
        summary.trade_count,
        summary.total_fees,
        sell.new_buying_power
    );
    Ok(())
}

/// Trade dialog helpers: max affordable shares and order previews.
fn scenario_2_previews_and_limits() -> SimResult {
    println!("Scenario 2: Previews and Limits\n");

    let engine = SettlementEngine::in_memory(SettlementConfig::default());
    let bob = AccountId::new("bob");
    let acme = Symbol::new("ACME");
    engine.open_account(&bob)?;

    let max = engine.max_affordable_shares(&bob, dec!(50))?;
    println!("  Max affordable @ $50 with 2% fee: {} shares", max);

    let quote = engine.preview_order(&bob, &acme, Side::Buy, max, dec!(50))?;
    println!(
        "  Preview: value ${}, fee ${}, total ${}, buying power after ${}",
        quote.estimated_value, quote.fee, quote.net_value, quote.buying_power_after
    );

    engine.execute_order(&bob, &acme, Side::Buy, max, dec!(50))?;
    let sellable = engine.max_sellable_shares(&bob, &acme)?;
    let partial = engine.execute_order(&bob, &acme, Side::Sell, sellable / dec!(2), dec!(55))?;
    println!(
        "  Sold half ({} shares) @ $55, realized ${}, {} shares left\n",
        partial.trade.shares,
        partial.realized_pnl().unwrap_or_default(),
        engine.max_sellable_shares(&bob, &acme)?
    );
    Ok(())
}

/// Orders the engine refuses, and the payload a caller would see.
fn scenario_3_rejections() -> SimResult {
    println!("Scenario 3: Rejected Orders\n");

    let engine = SettlementEngine::in_memory(SettlementConfig::default());
    let carol = AccountId::new("carol");
    let acme = Symbol::new("ACME");
    engine.open_account(&carol)?;
    engine.execute_order(&carol, &acme, Side::Buy, dec!(10), dec!(50))?;

    let attempts = [
        ("sell 20 of 10 held", Side::Sell, dec!(20), dec!(50)),
        ("buy 5000 @ $50", Side::Buy, dec!(5000), dec!(50)),
        ("buy 0 shares", Side::Buy, dec!(0), dec!(50)),
        ("buy at $0", Side::Buy, dec!(1), dec!(0)),
    ];

    for (label, side, shares, price) in attempts {
        if let Err(err) = engine.execute_order(&carol, &acme, side, shares, price) {
            let response = ErrorResponse::from(&err);
            println!("  {}: {}", label, serde_json::to_string(&response)?);
        }
    }

    let account = engine.account(&carol)?;
    println!("  Account untouched: version {}, buying power ${}\n", account.version, account.buying_power);
    Ok(())
}

/// Two threads race to spend the same cash. Exactly one can win.
fn scenario_4_concurrent_buyers() -> SimResult {
    println!("Scenario 4: Concurrent Buyers\n");

    let config = SettlementConfig::legacy().with_initial_buying_power(Quote::new(dec!(1000)));
    let engine = Arc::new(SettlementEngine::in_memory(config));
    let dave = AccountId::new("dave");
    engine.open_account(&dave)?;

    let outcomes: Vec<Result<SettlementResult, SettlementError>> = thread::scope(|scope| {
        let handles: Vec<_> = ["ACME", "GLOBEX"]
            .into_iter()
            .map(|ticker| {
                let engine = Arc::clone(&engine);
                let dave = dave.clone();
                scope.spawn(move || engine.execute_order(&dave, &Symbol::new(ticker), Side::Buy, dec!(6), dec!(100)))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(SettlementError::StoreUnavailable("worker panicked".into()))))
            .collect()
    });

    for outcome in &outcomes {
        match outcome {
            Ok(result) => println!("  {} filled after {} attempt(s)", result.trade.symbol, result.attempts),
            Err(err) => println!("  rejected: {}", err),
        }
    }
    println!("  Buying power: ${}\n", engine.account(&dave)?.buying_power);
    Ok(())
}

fn scenario_5_reset() -> SimResult {
    println!("Scenario 5: Account Reset\n");

    let engine = SettlementEngine::in_memory(SettlementConfig::tournament());
    let erin = AccountId::new("erin");
    engine.open_account(&erin)?;
    engine.execute_order(&erin, &Symbol::new("ACME"), Side::Buy, dec!(100), dec!(120))?;
    println!("  Before reset: ${} cash, {} positions", engine.account(&erin)?.buying_power, engine.positions(&erin)?.len());

    let account = engine.reset_account(&erin)?;
    println!(
        "  After reset: ${} cash, {} positions, {} trades\n",
        account.buying_power,
        engine.positions(&erin)?.len(),
        engine.trade_history(&erin)?.len()
    );
    Ok(())
}

fn scenario_6_portfolio_and_watchlists() -> SimResult {
    println!("Scenario 6: Portfolio Valuation and Watchlists\n");

    let engine = SettlementEngine::in_memory(SettlementConfig::default());
    let oracle = StaticPriceOracle::new();
    let frank = AccountId::new("frank");
    let acme = Symbol::new("ACME");
    let globex = Symbol::new("GLOBEX");

    oracle.set_price(&acme, Price::new(dec!(40)).ok_or("bad price")?);
    oracle.set_price(&globex, Price::new(dec!(210)).ok_or("bad price")?);

    engine.open_account(&frank)?;
    engine.execute_market_order(&oracle, &frank, &acme, Side::Buy, dec!(50))?;
    engine.execute_market_order(&oracle, &frank, &globex, Side::Buy, dec!(2.5))?;

    oracle.close_session();
    oracle.set_price(&acme, Price::new(dec!(44)).ok_or("bad price")?);
    oracle.set_price(&globex, Price::new(dec!(200)).ok_or("bad price")?);

    let summary = engine.portfolio_summary(&frank, &oracle)?;
    for holding in &summary.holdings {
        println!(
            "  {}: {} shares, value ${}, unrealized ${}",
            holding.symbol, holding.shares, holding.market_value, holding.unrealized_pnl
        );
    }
    println!(
        "  Portfolio ${}, day ${} ({}%)",
        summary.portfolio_value,
        summary.daily_pnl,
        summary.daily_pnl_pct.round_dp(3)
    );

    let watchlists = WatchlistStore::new();
    let tech = watchlists.create(&frank, "Tech", Timestamp::now())?;
    watchlists.add_symbol(&frank, tech.id, &acme)?;
    watchlists.add_symbol(&frank, tech.id, &globex)?;
    watchlists.add_symbol(&frank, tech.id, &acme)?;
    println!("  Watching: {:?}", watchlists.all_symbols(&frank).iter().map(Symbol::as_str).collect::<Vec<_>>());
    Ok(())
}

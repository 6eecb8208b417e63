//! Baskt ledger simulation.
//!
//! Walks the ledger through its lifecycle: pool deposits, the withdrawal queue,
//! order fills, funding accrual, closes and liquidations.
//!
//! `RUST_LOG` controls log output (default `info`). `BASKT_CONFIG` may point at a
//! JSON config file; otherwise `BASKT_ENV` picks a preset.

use baskt_ledger::*;
use rust_decimal_macros::dec;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type SimResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> SimResult {
    tracing_subscriber::registry()
        .with(EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())))
        .with(fmt::layer())
        .init();

    let config = load_config()?;
    println!("Baskt Ledger Simulation");
    println!("Single Pool, Per-Basket Funding, FIFO Withdrawals\n");

    scenario_1_pool_deposits(&config)?;
    scenario_2_withdrawal_queue(&config)?;
    scenario_3_position_lifecycle(&config)?;
    scenario_4_funding_accrual(&config)?;
    scenario_5_liquidation(&config)?;
    scenario_6_fee_report(&config)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn load_config() -> Result<LedgerConfig, Box<dyn std::error::Error>> {
    if let Ok(path) = std::env::var("BASKT_CONFIG") {
        let json = std::fs::read_to_string(&path)?;
        tracing::info!(%path, "loading config file");
        return Ok(LedgerConfig::from_json(&json)?);
    }
    let env = match std::env::var("BASKT_ENV").as_deref() {
        Ok("testnet") => Environment::Testnet,
        Ok("mainnet") => Environment::Mainnet,
        _ => Environment::Development,
    };
    let config = env.config();
    config.validate()?;
    Ok(config)
}

fn new_ledger(config: &LedgerConfig) -> Result<(Ledger, MockPriceFeed), LedgerError> {
    let feed = MockPriceFeed::new();
    let mut ledger = Ledger::with_config(config.clone(), Box::new(feed.clone()))?;
    ledger.set_time(Timestamp::from_secs(1_700_000_000));
    Ok((ledger, feed))
}

/// Two providers deposit into a fresh pool.
fn scenario_1_pool_deposits(config: &LedgerConfig) -> SimResult {
    println!("Scenario 1: Pool Deposits\n");

    let (mut ledger, _feed) = new_ledger(config)?;
    ledger.initialize_pool(10, 30, 1_000_000)?;

    let alice = AccountId(1);
    let bob = AccountId(2);

    let shares = ledger.deposit(alice, 10_000_000)?;
    println!("  Alice deposits 10,000,000, receives {} shares", shares);
    let shares = ledger.deposit(bob, 5_000_000)?;
    println!("  Bob deposits 5,000,000, receives {} shares", shares);

    let pool = ledger.pool();
    println!("  Pool: {} liquidity / {} shares, price {}\n", pool.total_liquidity, pool.total_shares, ledger.share_price());
    Ok(())
}

/// Withdrawals queue up and get served oldest first.
fn scenario_2_withdrawal_queue(config: &LedgerConfig) -> SimResult {
    println!("Scenario 2: Withdrawal Queue\n");

    let (mut ledger, _feed) = new_ledger(config)?;
    ledger.initialize_pool(10, 30, 1_000_000)?;

    let alice = AccountId(1);
    let bob = AccountId(2);
    ledger.deposit(alice, 10_000_000)?;
    ledger.deposit(bob, 2_000_000)?;

    let first = ledger.request_withdrawal(alice, 1_000_000)?;
    let second = ledger.request_withdrawal(bob, 500_000)?;
    let third = ledger.request_withdrawal(alice, 250_000)?;
    println!("  Queued #{} #{} #{}", first.queue_position, second.queue_position, third.queue_position);

    ledger.cancel_withdrawal(third.id, alice)?;
    println!("  Alice cancels her second request");

    let result = ledger.process_queue(10, false)?;
    println!(
        "  Processed {} items: {} paid out, {} in fees, {} deferred",
        result.items_processed,
        result.total_amount_processed,
        result.total_fees_collected,
        result.deferred.len()
    );
    let pool = ledger.pool();
    println!("  Pool: {} liquidity / {} shares\n", pool.total_liquidity, pool.total_shares);
    Ok(())
}

/// Open a long, close it at a profit.
fn scenario_3_position_lifecycle(config: &LedgerConfig) -> SimResult {
    println!("Scenario 3: Position Lifecycle\n");

    let (mut ledger, feed) = new_ledger(config)?;
    let baskt = BasktId(1);
    let trader = AccountId(7);
    ledger.initialize_baskt(baskt)?;
    feed.set_price(baskt, 50, ledger.time());

    let order = ledger.submit_order(OrderRequest::open(trader, baskt, Side::Long, 100, 10_000))?;
    let position = ledger.fill_order_at_oracle(order.id)?;
    println!("  Long {} @ {}, collateral after fee {}", position.size, position.entry_price, position.collateral);

    ledger.advance_time(60);
    feed.set_price(baskt, 55, ledger.time());
    let close = ledger.submit_close_order(trader, position.id)?;
    let closed = ledger.fill_order_at_oracle(close.id)?;
    println!(
        "  Closed @ {}: pnl {:?}, status {:?}\n",
        closed.exit_price.map(|p| p.to_string()).unwrap_or_default(),
        closed.realized_pnl,
        closed.status
    );
    Ok(())
}

/// A positive rate makes longs pay and shorts receive.
fn scenario_4_funding_accrual(config: &LedgerConfig) -> SimResult {
    println!("Scenario 4: Funding Accrual\n");

    let (mut ledger, feed) = new_ledger(config)?;
    let baskt = BasktId(2);
    ledger.initialize_baskt(baskt)?;
    feed.set_price(baskt, 100, ledger.time());

    let long = ledger.submit_order(OrderRequest::open(AccountId(1), baskt, Side::Long, 1_000_000, 20_000_000))?;
    let short = ledger.submit_order(OrderRequest::open(AccountId(2), baskt, Side::Short, 1_000_000, 20_000_000))?;
    let long = ledger.fill_order_at_oracle(long.id)?;
    let short = ledger.fill_order_at_oracle(short.id)?;

    ledger.update_rate(baskt, Bps::new(100))?;
    println!("  Rate set to 100 bps, annualized {:?} bps", annualized_rate_bps(Bps::new(100), &config.funding));
    ledger.advance_time(3_600);

    println!("  Index after one hour: {}", ledger.current_index(baskt)?);
    println!("  Long pays {}", ledger.settle_funding(long.id)?);
    println!("  Short pays {}\n", ledger.settle_funding(short.id)?);
    Ok(())
}

/// Price drops through maintenance and the position is liquidated.
fn scenario_5_liquidation(config: &LedgerConfig) -> SimResult {
    println!("Scenario 5: Liquidation\n");

    let (mut ledger, feed) = new_ledger(config)?;
    let baskt = BasktId(3);
    ledger.initialize_baskt(baskt)?;
    feed.set_price(baskt, 50, ledger.time());

    let entry = Price::from_int(50).ok_or("bad price")?;
    let required = required_collateral(100, entry, config.margin.initial_margin_bps).ok_or("overflow")?;
    let order = ledger.submit_order(OrderRequest::open(AccountId(3), baskt, Side::Long, 100, required + 10))?;
    let position = ledger.fill_order_at_oracle(order.id)?;
    println!("  Long 100 @ 50 with {} collateral", position.collateral);
    if let Some(liq) = liquidation_price(&position, &config.margin) {
        println!("  Estimated liquidation price {}", liq);
    }

    let crash = Price::new(dec!(46.5)).ok_or("bad price")?;
    match ledger.liquidate_position(position.id, entry) {
        Err(LedgerError::PositionHealthy(_)) => println!("  At 50 the position is healthy"),
        other => println!("  Unexpected: {:?}", other),
    }
    let result = ledger.liquidate_position(position.id, crash)?;
    println!(
        "  At {}: equity {} < maintenance {}, fee {}, returned {}\n",
        crash, result.equity, result.maintenance, result.fee_paid, result.collateral_returned
    );
    Ok(())
}

/// Everything above feeds the journal; report by type.
fn scenario_6_fee_report(config: &LedgerConfig) -> SimResult {
    println!("Scenario 6: Fee Report\n");

    let (ledger, feed) = new_ledger(config)?;
    let shared = SharedLedger::new(ledger);
    let baskt = BasktId(1);

    shared.write(|l| {
        l.initialize_pool(10, 30, 1_000_000)?;
        l.initialize_baskt(baskt)?;
        l.deposit(AccountId(1), 50_000_000)?;
        Ok(())
    })?;
    feed.set_price(baskt, 50, shared.read(|l| l.time())?);

    shared.write(|l| {
        for trader in 10..15 {
            let order = l.submit_order(OrderRequest::open(AccountId(trader), baskt, Side::Long, 1_000, 10_000))?;
            let position = l.fill_order_at_oracle(order.id)?;
            l.close_position(position.id, Price::from_int(52).ok_or(LedgerError::MathOverflow)?)?;
        }
        l.request_withdrawal(AccountId(1), 5_000_000)?;
        l.process_queue(1, false)?;
        Ok(())
    })?;

    let stats = shared.read(|l| l.fee_stats(None))?;
    for (event_type, s) in &stats {
        println!(
            "  {:?}: {} events, {} total ({} treasury / {} blp)",
            event_type, s.count, s.total_fees, s.total_fees_to_treasury, s.total_fees_to_blp
        );
    }
    let vault = shared.read(|l| l.fee_vault())?;
    println!("  Vault: {} treasury, {} blp", vault.treasury, vault.blp);
    Ok(())
}

//! Concurrent access through `SharedLedger`.

use baskt_ledger::*;
use std::thread;

fn shared() -> (SharedLedger, MockPriceFeed) {
    let feed = MockPriceFeed::new();
    let mut ledger = Ledger::new(LedgerConfig::default(), Box::new(feed.clone()));
    ledger.set_time(Timestamp::from_secs(1_700_000_000));
    let shared = SharedLedger::new(ledger);
    shared
        .write(|l| {
            l.initialize_pool(0, 0, 1_000_000)?;
            l.initialize_baskt(BasktId(1))
        })
        .unwrap();
    (shared, feed)
}

#[test]
fn parallel_deposits_all_land() {
    let (ledger, _) = shared();

    let handles: Vec<_> = (1..=8u64)
        .map(|provider| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    ledger.write(|l| l.deposit(AccountId(provider), 1_000_000)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let (liquidity, shares, consistent) = ledger
        .read(|l| (l.pool().total_liquidity, l.pool().total_shares, l.pool().is_consistent()))
        .unwrap();
    assert_eq!(liquidity, 80_000_000);
    assert_eq!(shares, 80_000_000);
    assert!(consistent);
}

#[test]
fn processing_and_requests_interleave() {
    let (ledger, _) = shared();
    for provider in 1..=4u64 {
        ledger.write(|l| l.deposit(AccountId(provider), 10_000_000)).unwrap();
    }

    let requesters: Vec<_> = (1..=4u64)
        .map(|provider| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    ledger.write(|l| l.request_withdrawal(AccountId(provider), 1_000_000)).unwrap();
                }
            })
        })
        .collect();
    let processor = {
        let ledger = ledger.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                ledger.write(|l| l.process_queue(2, false)).unwrap();
            }
        })
    };
    for handle in requesters {
        handle.join().unwrap();
    }
    processor.join().unwrap();

    // whatever the interleaving, one final pass finishes the job
    ledger.write(|l| l.process_queue(usize::MAX, false)).unwrap();
    let (pending, liquidity, shares) = ledger
        .read(|l| (l.pending_withdrawals(), l.pool().total_liquidity, l.pool().total_shares))
        .unwrap();
    assert_eq!(pending, 0);
    assert_eq!(liquidity, 20_000_000);
    assert_eq!(shares, 20_000_000);
}

#[test]
fn readers_see_whole_operations() {
    let (ledger, feed) = shared();
    let baskt = BasktId(1);
    let now = ledger.read(|l| l.time()).unwrap();
    feed.set_price(baskt, 50, now);

    let writer = {
        let ledger = ledger.clone();
        thread::spawn(move || {
            for trader in 1..=20u64 {
                ledger
                    .write(|l| {
                        let order = l.submit_order(OrderRequest::open(AccountId(trader), baskt, Side::Long, 100, 1_000))?;
                        l.fill_order_at_oracle(order.id)
                    })
                    .unwrap();
            }
        })
    };

    // an order is never seen half filled: pending orders and open positions cover every order
    for _ in 0..50 {
        let (orders, pending, open) = ledger
            .read(|l| {
                let orders: usize = (1..=20u64).map(|t| l.orders_for(AccountId(t)).len()).sum();
                (orders, l.pending_orders(baskt).len(), l.open_positions(baskt).len())
            })
            .unwrap();
        assert_eq!(orders, pending + open);
    }
    writer.join().unwrap();

    let (long, short) = ledger.read(|l| l.open_interest(baskt)).unwrap();
    assert_eq!(long, 2_000);
    assert_eq!(short, 0);
}

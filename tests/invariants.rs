//! Property-based checks for the order book's core invariants and the
//! tick/price bijection, run against random sequences of LIMIT/MARKET
//! submissions and cancels.

use std::collections::HashMap;

use proptest::prelude::*;

use exchange_sim::{
    orderbook::OrderBook,
    orders::{Order, Side},
    tick::{price_to_tick, tick_to_price},
};

#[derive(Debug, Clone)]
enum Op {
    AddLimit { side: Side, tick: u64, qty: u64 },
    AddMarket { side: Side, qty: u64 },
    CancelById { pick: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (prop::bool::ANY, 90u64..110, 1u64..20).prop_map(|(bid, tick, qty)| Op::AddLimit {
            side: if bid { Side::Bid } else { Side::Ask },
            tick,
            qty,
        }),
        2 => (prop::bool::ANY, 1u64..15).prop_map(|(bid, qty)| Op::AddMarket {
            side: if bid { Side::Bid } else { Side::Ask },
            qty,
        }),
        1 => (0usize..64).prop_map(|pick| Op::CancelById { pick }),
    ]
}

/// Asserts the book's core invariants against its public API: no
/// crossed book, level totals matching a parallel model, and no
/// zero-quantity residents. Checked transitively through `depth()`
/// plus the model, since the book's internal `Level`/index types are
/// private to the crate.
fn assert_invariants(book: &mut OrderBook, model: &HashMap<u64, (Side, u64, u64)>) {
    if let (Some((bb, _)), Some((ba, _))) = (book.best_bid(), book.best_ask()) {
        assert!(bb < ba, "crossed book: bid {bb} >= ask {ba}");
    }

    let (bids, asks) = book.depth(usize::MAX);
    let mut expected_bid_totals: HashMap<u64, u64> = HashMap::new();
    let mut expected_ask_totals: HashMap<u64, u64> = HashMap::new();
    for &(side, tick, qty) in model.values() {
        assert!(qty > 0, "model must never retain a zero-quantity resting order");
        match side {
            Side::Bid => *expected_bid_totals.entry(tick).or_insert(0) += qty,
            Side::Ask => *expected_ask_totals.entry(tick).or_insert(0) += qty,
        }
    }
    let bid_map: HashMap<u64, u64> = bids.into_iter().collect();
    let ask_map: HashMap<u64, u64> = asks.into_iter().collect();
    assert_eq!(bid_map, expected_bid_totals, "level_size mismatch on bid side");
    assert_eq!(ask_map, expected_ask_totals, "level_size mismatch on ask side");

    for (&id, &(_side, tick, qty)) in model {
        assert!(book.contains_order(id), "index entry {id} missing");
        assert_eq!(book.order_tick(id), Some(tick), "index tick mismatch for {id}");
        assert!(qty > 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn book_invariants_hold_after_every_operation(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut book = OrderBook::new();
        let mut model: HashMap<u64, (Side, u64, u64)> = HashMap::new();
        let mut next_id = 1u64;

        for op in ops {
            match op {
                Op::AddLimit { side, tick, qty } => {
                    let id = next_id;
                    next_id += 1;
                    let pre_opposite: u64 = model
                        .values()
                        .filter(|&&(s, t, _)| {
                            s != side
                                && match side {
                                    Side::Bid => t <= tick,
                                    Side::Ask => t >= tick,
                                }
                        })
                        .map(|&(_, _, q)| q)
                        .sum();

                    let order = Order::limit(id, side, tick, qty, 0);
                    let trades = book.add_order(order).unwrap();
                    let traded: u64 = trades.iter().map(|t| t.quantity).sum();
                    prop_assert!(traded <= qty);
                    prop_assert!(traded <= pre_opposite);

                    apply_trades_to_model(&mut model, &trades);
                    let residual = qty - traded;
                    if residual > 0 {
                        model.insert(id, (side, tick, residual));
                    }
                }
                Op::AddMarket { side, qty } => {
                    let pre_opposite: u64 = model
                        .values()
                        .filter(|&&(s, _, _)| s != side)
                        .map(|&(_, _, q)| q)
                        .sum();

                    let id = next_id;
                    next_id += 1;
                    let order = Order::market(id, side, qty, 0);
                    let trades = book.add_order(order).unwrap();
                    let traded: u64 = trades.iter().map(|t| t.quantity).sum();

                    // A MARKET order fills exactly min(requested, pre-trade opposite liquidity).
                    prop_assert_eq!(traded, qty.min(pre_opposite));
                    apply_trades_to_model(&mut model, &trades);
                }
                Op::CancelById { pick } => {
                    if model.is_empty() {
                        continue;
                    }
                    let mut ids: Vec<u64> = model.keys().copied().collect();
                    ids.sort_unstable();
                    let id = ids[pick % ids.len()];
                    let ok = book.cancel_by_id(id);
                    prop_assert!(ok);
                    model.remove(&id);
                }
            }
            assert_invariants(&mut book, &model);
        }
    }

    #[test]
    fn tick_roundtrip_stays_within_half_a_tick(cents in 1u64..1_000_000) {
        let tick_size = 0.01;
        let price = cents as f64 * tick_size;
        let tick = price_to_tick(price, tick_size).unwrap();
        let back = tick_to_price(tick, tick_size);
        prop_assert!((back - price).abs() <= tick_size / 2.0 + 1e-9);
    }
}

fn apply_trades_to_model(
    model: &mut HashMap<u64, (Side, u64, u64)>,
    trades: &[exchange_sim::trade::Trade],
) {
    for trade in trades {
        if let Some(entry) = model.get_mut(&trade.maker_id) {
            entry.2 -= trade.quantity;
            if entry.2 == 0 {
                model.remove(&trade.maker_id);
            }
        }
    }
}

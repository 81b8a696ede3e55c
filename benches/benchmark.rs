use criterion::{Criterion, criterion_group, criterion_main};
use exchange_sim::orderbook::OrderBook;
use exchange_sim::orders::{Order, Side};

/// Seeds `depth` non-crossing levels per side, `orders_per_level` orders
/// each: asks above `depth`, bids below it, so seeding itself never
/// matches.
fn setup_order_book(depth: u64, orders_per_level: u64) -> OrderBook {
    let mut ob = OrderBook::new();
    let mut id = 1u64;
    for tick in 1..=depth {
        for _ in 0..orders_per_level {
            ob.add_order(Order::limit(id, Side::Bid, tick, 1, 0)).unwrap();
            id += 1;
            ob.add_order(Order::limit(id, Side::Ask, depth + tick, 1, 0))
                .unwrap();
            id += 1;
        }
    }
    ob
}

fn bench_match_order(c: &mut Criterion) {
    let depth = 100;
    let orders_per_level = 10;

    c.bench_function("market order sweeps half the ask side", |b| {
        b.iter_batched(
            || setup_order_book(depth, orders_per_level),
            |mut ob| {
                let market_buy = Order::market(0, Side::Bid, depth * orders_per_level / 2, 0);
                ob.add_order(market_buy).unwrap();
            },
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("crossing limit order sweeps the full ask side", |b| {
        b.iter_batched(
            || setup_order_book(depth, orders_per_level),
            |mut ob| {
                let limit_bid = Order::limit(1, Side::Bid, 2 * depth, depth * orders_per_level, 0);
                ob.add_order(limit_bid).unwrap();
            },
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("cancel_by_id on a mid-depth order", |b| {
        b.iter_batched(
            || setup_order_book(depth, orders_per_level),
            |mut ob| {
                ob.cancel_by_id(depth * orders_per_level);
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_match_order);
criterion_main!(benches);

//! Pluggable trading agents.
//!
//! The capability set (`generate`, `on_placed`, `on_removed`,
//! `pick_cancel`, `pull_stale`, `clear`) is small and closed, so
//! concrete agents are a tagged sum rather than an open trait
//! hierarchy — easier to match exhaustively and nothing here needs
//! dynamic dispatch.
//!
//! Agents never touch the RNG themselves; the driver passes one in by
//! mutable reference so every draw happens in a single, replayable
//! order (see `driver.rs`).

use std::collections::HashSet;

use rand::Rng;

use crate::{
    orderbook::OrderBook,
    orders::{Order, Side},
    regime,
    tick::Tick,
};

/// A read-only snapshot of book/price state passed to `generate` each tick.
pub struct AgentContext {
    pub t: u64,
    pub mid_price: f64,
    pub mid_tick: Tick,
    pub best_bid: Option<(Tick, u64)>,
    pub best_ask: Option<(Tick, u64)>,
    pub momentum: f64,
}

#[derive(Debug, Clone)]
pub struct MarketMakerParams {
    pub spread_ticks: u64,
    pub size: u64,
}

impl Default for MarketMakerParams {
    fn default() -> Self {
        Self {
            spread_ticks: 2,
            size: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MomentumParams {
    pub threshold: f64,
    pub size: u64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            size: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeanReversionParams {
    pub reference_price: f64,
    pub threshold: f64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct NoiseTraderParams {
    pub spread_ticks: u64,
    pub size: u64,
}

impl Default for NoiseTraderParams {
    fn default() -> Self {
        Self {
            spread_ticks: 6,
            size: 5,
        }
    }
}

enum Kind {
    MarketMaker(MarketMakerParams),
    MomentumTrader(MomentumParams),
    MeanReversion(MeanReversionParams),
    NoiseTrader(NoiseTraderParams),
}

/// One trading agent: a name, a cancel aggressiveness, an owned-order
/// set, and a behavior.
pub struct Agent {
    name: String,
    cancel_aggressiveness: f64,
    owned: HashSet<u64>,
    kind: Kind,
}

impl Agent {
    pub fn market_maker(name: impl Into<String>, params: MarketMakerParams) -> Self {
        Self {
            name: name.into(),
            cancel_aggressiveness: 0.95,
            owned: HashSet::new(),
            kind: Kind::MarketMaker(params),
        }
    }

    pub fn momentum_trader(name: impl Into<String>, params: MomentumParams) -> Self {
        Self {
            name: name.into(),
            cancel_aggressiveness: 0.5,
            owned: HashSet::new(),
            kind: Kind::MomentumTrader(params),
        }
    }

    pub fn mean_reversion(name: impl Into<String>, params: MeanReversionParams) -> Self {
        Self {
            name: name.into(),
            cancel_aggressiveness: 0.5,
            owned: HashSet::new(),
            kind: Kind::MeanReversion(params),
        }
    }

    pub fn noise_trader(name: impl Into<String>, params: NoiseTraderParams) -> Self {
        Self {
            name: name.into(),
            cancel_aggressiveness: 0.3,
            owned: HashSet::new(),
            kind: Kind::NoiseTrader(params),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owned_ids(&self) -> &HashSet<u64> {
        &self.owned
    }

    pub fn on_placed(&mut self, id: u64) {
        self.owned.insert(id);
    }

    pub fn on_removed(&mut self, id: u64) {
        self.owned.remove(&id);
    }

    pub fn clear(&mut self) {
        self.owned.clear();
    }

    /// Drops owned ids the book no longer knows about (filled or
    /// cancelled elsewhere). Must run before `pick_cancel`/`pull_stale`.
    pub fn prune(&mut self, book: &OrderBook) {
        self.owned.retain(|id| book.contains_order(*id));
    }

    /// Produces this tick's orders. `next_id` is advanced in place for
    /// every order built, whether or not it ultimately rests.
    pub fn generate(
        &self,
        ctx: &AgentContext,
        next_id: &mut u64,
        rng: &mut impl Rng,
    ) -> Vec<Order> {
        match &self.kind {
            Kind::MarketMaker(p) => {
                let mut orders = Vec::with_capacity(2);
                let bid_tick = ctx.mid_tick.saturating_sub(p.spread_ticks).max(1);
                let ask_tick = ctx.mid_tick + p.spread_ticks;
                orders.push(Order::limit(*next_id, Side::Bid, bid_tick, p.size, ctx.t));
                *next_id += 1;
                orders.push(Order::limit(*next_id, Side::Ask, ask_tick, p.size, ctx.t));
                *next_id += 1;
                orders
            }
            Kind::MomentumTrader(p) => {
                if ctx.momentum > p.threshold {
                    let o = Order::market(*next_id, Side::Bid, p.size, ctx.t);
                    *next_id += 1;
                    vec![o]
                } else if ctx.momentum < -p.threshold {
                    let o = Order::market(*next_id, Side::Ask, p.size, ctx.t);
                    *next_id += 1;
                    vec![o]
                } else {
                    Vec::new()
                }
            }
            Kind::MeanReversion(p) => {
                let deviation = (ctx.mid_price - p.reference_price) / p.reference_price;
                if deviation > p.threshold {
                    let o = Order::market(*next_id, Side::Ask, p.size, ctx.t);
                    *next_id += 1;
                    vec![o]
                } else if deviation < -p.threshold {
                    let o = Order::market(*next_id, Side::Bid, p.size, ctx.t);
                    *next_id += 1;
                    vec![o]
                } else {
                    Vec::new()
                }
            }
            Kind::NoiseTrader(p) => {
                let id = *next_id;
                *next_id += 1;
                let side = if id % 2 == 0 { Side::Bid } else { Side::Ask };
                let tick = match side {
                    Side::Bid => ctx.mid_tick.saturating_sub(p.spread_ticks).max(1),
                    Side::Ask => ctx.mid_tick + p.spread_ticks,
                };
                vec![Order::limit(id, side, tick, p.size, ctx.t)]
            }
        }
    }

    /// Selects one owned order to cancel, weighted by squared distance
    /// from `mid_tick` (farther orders are proportionally more likely).
    pub fn pick_cancel(
        &self,
        book: &OrderBook,
        mid_tick: Tick,
        rng: &mut impl Rng,
    ) -> Option<u64> {
        let mut ids: Vec<u64> = self.owned.iter().copied().collect();
        ids.sort_unstable();
        let weighted: Vec<(u64, f64)> = ids
            .into_iter()
            .filter_map(|id| {
                let tick = book.order_tick(id)?;
                let dist = mid_tick.abs_diff(tick) as f64;
                Some((id, dist * dist + 1.0))
            })
            .collect();
        weighted_choice(rng, &weighted)
    }

    /// Owned orders farther than `max_dist` from `mid_tick` are pulled
    /// with probability `cancel_aggressiveness * min(1, dist/max_dist)`.
    pub fn pull_stale(
        &self,
        book: &OrderBook,
        mid_tick: Tick,
        max_dist: u64,
        rng: &mut impl Rng,
    ) -> Vec<u64> {
        let mut ids: Vec<u64> = self.owned.iter().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter(|&id| {
                let Some(tick) = book.order_tick(id) else {
                    return false;
                };
                let dist = mid_tick.abs_diff(tick);
                if dist <= max_dist {
                    return false;
                }
                let p = self.cancel_aggressiveness * (dist as f64 / max_dist as f64).min(1.0);
                rng.random::<f64>() < p
            })
            .collect()
    }
}

fn weighted_choice(rng: &mut impl Rng, weighted: &[(u64, f64)]) -> Option<u64> {
    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut draw = rng.random::<f64>() * total;
    for &(id, w) in weighted {
        if draw < w {
            return Some(id);
        }
        draw -= w;
    }
    weighted.last().map(|&(id, _)| id)
}

/// Log-normal order size for seeding: `exp(N(2.3, 0.6))`, clamped to
/// `[1, 200]`.
pub fn seed_order_size(rng: &mut impl Rng) -> u64 {
    regime::lognormal_clamped(rng, 2.3, 0.6, 1, 200)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx(mid_tick: Tick, momentum: f64) -> AgentContext {
        AgentContext {
            t: 0,
            mid_price: mid_tick as f64 * 0.01,
            mid_tick,
            best_bid: None,
            best_ask: None,
            momentum,
        }
    }

    #[test]
    fn market_maker_quotes_both_sides_around_mid() {
        let agent = Agent::market_maker("mm1", MarketMakerParams::default());
        let mut rng = StdRng::seed_from_u64(1);
        let mut next_id = 1;
        let orders = agent.generate(&ctx(100, 0.0), &mut next_id, &mut rng);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, Side::Bid);
        assert_eq!(orders[0].price_tick, Some(98));
        assert_eq!(orders[1].side, Side::Ask);
        assert_eq!(orders[1].price_tick, Some(102));
    }

    #[test]
    fn momentum_trader_only_fires_past_threshold() {
        let agent = Agent::momentum_trader("mom1", MomentumParams::default());
        let mut rng = StdRng::seed_from_u64(1);
        let mut next_id = 1;
        assert!(agent.generate(&ctx(100, 0.0), &mut next_id, &mut rng).is_empty());

        let up = agent.generate(&ctx(100, 0.05), &mut next_id, &mut rng);
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].side, Side::Bid);
        assert_eq!(up[0].order_type, crate::orders::OrderType::Market);

        let down = agent.generate(&ctx(100, -0.05), &mut next_id, &mut rng);
        assert_eq!(down[0].side, Side::Ask);
    }

    #[test]
    fn mean_reversion_fades_deviation() {
        let agent = Agent::mean_reversion(
            "mr1",
            MeanReversionParams {
                reference_price: 10.0,
                threshold: 0.02,
                size: 5,
            },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let mut next_id = 1;
        let above = agent.generate(&ctx(1050, 0.0), &mut next_id, &mut rng);
        assert_eq!(above[0].side, Side::Ask);
    }

    #[test]
    fn prune_drops_ids_no_longer_in_book() {
        let mut agent = Agent::noise_trader("n1", NoiseTraderParams::default());
        agent.on_placed(1);
        agent.on_placed(2);
        let book = OrderBook::new();
        agent.prune(&book);
        assert!(agent.owned_ids().is_empty());
    }

    #[test]
    fn pull_stale_never_pulls_within_distance() {
        let mut book = OrderBook::new();
        book.add_order(Order::limit(1, Side::Bid, 100, 5, 0)).unwrap();
        let mut agent = Agent::market_maker("mm1", MarketMakerParams::default());
        agent.on_placed(1);
        let mut rng = StdRng::seed_from_u64(7);
        let pulled = agent.pull_stale(&book, 100, 50, &mut rng);
        assert!(pulled.is_empty());
    }
}

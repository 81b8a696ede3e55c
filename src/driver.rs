//! Order-flow driver: owns the RNG, the book, the agent roster, and
//! the global sequence counter, and turns all of that into an ordered
//! L3 message stream.
//!
//! Every random draw funnels through `self.rng`, a single
//! [`StdRng`] seeded once at construction — that, plus the fixed draw
//! order within each step, is what makes two runs built from the same
//! [`SimConfig`] produce byte-identical output. Nothing downstream of
//! `new`/`with_agents` may introduce a second source of randomness.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use tracing::warn;

use crate::{
    agent::{Agent, AgentContext, MarketMakerParams, NoiseTraderParams, seed_order_size},
    config::{RegimeParams, SimConfig},
    message::L3Message,
    orderbook::OrderBook,
    orders::{Order, OrderType, Side},
    regime::{self, MidPriceState},
    tick::{self, Tick},
};

pub struct OrderFlowDriver {
    book: OrderBook,
    cfg: SimConfig,
    rng: StdRng,
    next_id: u64,
    t: u64,
    sec: u64,
    day: u32,
    state: MidPriceState,
    agents: Vec<Agent>,
}

fn default_agents() -> Vec<Agent> {
    vec![
        Agent::market_maker("mm-1", MarketMakerParams::default()),
        Agent::market_maker(
            "mm-2",
            MarketMakerParams {
                spread_ticks: 3,
                size: 8,
            },
        ),
        Agent::noise_trader("noise-1", NoiseTraderParams::default()),
        Agent::noise_trader(
            "noise-2",
            NoiseTraderParams {
                spread_ticks: 6,
                size: 5,
            },
        ),
    ]
}

impl OrderFlowDriver {
    pub fn new(cfg: SimConfig) -> Self {
        Self::with_agents(cfg, default_agents())
    }

    pub fn with_agents(cfg: SimConfig, agents: Vec<Agent>) -> Self {
        let start_price = cfg.start_price.max(cfg.min_price);
        let rng = StdRng::seed_from_u64(cfg.seed);
        Self {
            book: OrderBook::new(),
            state: MidPriceState::new(start_price),
            rng,
            next_id: 1,
            t: 0,
            sec: 0,
            day: 0,
            agents,
            cfg,
        }
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn seq(&self) -> u64 {
        self.t
    }

    pub fn mid_price(&self) -> f64 {
        self.state.mid_price
    }

    pub fn tick_size(&self) -> f64 {
        self.cfg.tick_size
    }

    pub fn is_finished(&self) -> bool {
        self.cfg.num_days.is_some_and(|nd| self.day >= nd)
    }

    /// Runs one simulated second of activity and returns every L3
    /// message it produced, in emission order. Returns an empty
    /// vector once `num_days` sessions have completed.
    pub fn step_second(&mut self) -> Vec<L3Message> {
        let mut out = Vec::new();
        if self.is_finished() {
            return out;
        }
        if self.sec == 0 {
            self.seed_session(&mut out);
        }

        let activity = regime::intraday_activity_factor(self.sec, self.cfg.session_seconds);
        let vol_scale = regime::intraday_volatility_factor(self.sec, self.cfg.session_seconds);

        if self.sec > 0 && self.sec % self.cfg.stale_purge_interval == 0 {
            self.stale_purge_sweep(&mut out);
        }

        regime::evolve(&mut self.rng, &mut self.state, &self.cfg, vol_scale);
        self.state.mid_price = self.state.mid_price.max(self.cfg.min_price);

        let mid_tick = tick::price_to_tick(self.state.mid_price, self.cfg.tick_size).unwrap_or(1);
        let regime_params = *self.cfg.regime(&self.state.regime);
        let dynamic_spread = (self.cfg.spread * regime_params.spread_mult).max(self.cfg.tick_size);
        let dynamic_spread_ticks =
            tick::price_to_tick(dynamic_spread, self.cfg.tick_size).unwrap_or(1).max(1);

        let ctx = AgentContext {
            t: self.t,
            mid_price: self.state.mid_price,
            mid_tick,
            best_bid: self.book.best_bid(),
            best_ask: self.book.best_ask(),
            momentum: self.state.momentum,
        };
        self.run_agent_orders(&ctx, &mut out);

        let n_orders = ((self.cfg.orders_per_tick as f64) * activity).round().max(1.0) as u64;
        for _ in 0..n_orders {
            self.emit_random_order(mid_tick, dynamic_spread, dynamic_spread_ticks, &regime_params, &mut out);
        }

        if self.cfg.sleep_sec > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(self.cfg.sleep_sec));
        }

        self.sec += 1;
        if self.sec >= self.cfg.session_seconds {
            self.sec = 0;
            self.end_of_day();
        }
        out
    }

    fn seed_session(&mut self, out: &mut Vec<L3Message>) {
        let mid_tick = tick::price_to_tick(self.state.mid_price, self.cfg.tick_size).unwrap_or(1);
        let half_spread_ticks = tick::price_to_tick(self.cfg.spread / 2.0, self.cfg.tick_size)
            .unwrap_or(1)
            .max(1);

        for level in 0..self.cfg.seed_levels {
            let bid_tick = mid_tick.saturating_sub(half_spread_ticks + level).max(1);
            let ask_tick = mid_tick + half_spread_ticks + level;
            for (side, level_tick) in [(Side::Bid, bid_tick), (Side::Ask, ask_tick)] {
                for _ in 0..self.cfg.seed_orders_per_level {
                    let size = seed_order_size(&mut self.rng);
                    let id = self.next_id;
                    self.next_id += 1;
                    let order = Order::limit(id, side, level_tick, size, self.t);
                    self.emit_order(order, out);
                    self.assign_random_owner(id);
                }
            }
        }
    }

    fn run_agent_orders(&mut self, ctx: &AgentContext, out: &mut Vec<L3Message>) {
        for i in 0..self.agents.len() {
            let orders = self.agents[i].generate(ctx, &mut self.next_id, &mut self.rng);
            for order in orders {
                let id = order.id;
                self.emit_order(order, out);
                if self.book.contains_order(id) {
                    self.agents[i].on_placed(id);
                }
            }
        }
    }

    fn emit_random_order(
        &mut self,
        mid_tick: Tick,
        dynamic_spread: f64,
        dynamic_spread_ticks: u64,
        regime_params: &RegimeParams,
        out: &mut Vec<L3Message>,
    ) {
        let side_bias = (0.5
            + regime_params.imbalance
            + if self.state.momentum > 0.0 { 0.05 } else { -0.05 })
        .clamp(0.05, 0.95);
        let side = if regime::bernoulli_clamped(&mut self.rng, side_bias) {
            Side::Bid
        } else {
            Side::Ask
        };

        let eff_market_ratio =
            (self.cfg.market_ratio * regime_params.market_ratio / 0.15).clamp(0.01, 0.9);
        let is_market = regime::bernoulli_clamped(&mut self.rng, eff_market_ratio);

        if regime::bernoulli_clamped(&mut self.rng, self.cfg.cancel_ratio) {
            self.try_cancel_owned(mid_tick, out);
        }

        let size = regime::lognormal_clamped(&mut self.rng, 2.2, 0.8, 1, 500);
        let id = self.next_id;
        self.next_id += 1;

        let order = if is_market {
            Order::market(id, side, size, self.t)
        } else {
            let exp_rate = 1.0 / (0.35 * dynamic_spread);
            let mut offset =
                dynamic_spread / 2.0 + Exp::new(exp_rate).expect("dynamic_spread > 0").sample(&mut self.rng);
            if self.rng.random::<f64>() < 0.6 {
                offset *= self.rng.random_range(0.2..0.6);
            }
            let mut price = match side {
                Side::Bid => self.state.mid_price - offset,
                Side::Ask => self.state.mid_price + offset,
            };
            if self.rng.random::<f64>() < 0.5 {
                price = (price / 0.05).round() * 0.05;
            }
            price = price.max(self.cfg.tick_size);
            let price_tick = tick::price_to_tick(price, self.cfg.tick_size).unwrap_or(1).max(1);
            Order::limit(id, side, price_tick, size, self.t)
        };
        let is_limit = order.order_type == OrderType::Limit;

        if is_limit && self.cfg.replenish {
            self.maybe_replenish(mid_tick, dynamic_spread_ticks, out);
        }

        self.emit_order(order, out);
        self.assign_random_owner(id);
    }

    fn maybe_replenish(&mut self, mid_tick: Tick, dynamic_spread_ticks: u64, out: &mut Vec<L3Message>) {
        for side in [Side::Bid, Side::Ask] {
            let starved = match self.book.distance_from_mid(side, mid_tick) {
                None => true,
                Some(d) => d as f64 > 2.5 * dynamic_spread_ticks as f64,
            };
            if !starved {
                continue;
            }
            let offset = (dynamic_spread_ticks as f64 / 2.0).round() as u64;
            let level_tick = match side {
                Side::Bid => mid_tick.saturating_sub(offset).max(1),
                Side::Ask => mid_tick + offset,
            };
            let size = seed_order_size(&mut self.rng);
            let id = self.next_id;
            self.next_id += 1;
            let order = Order::limit(id, side, level_tick, size, self.t);
            self.emit_order(order, out);
            self.assign_random_owner(id);
        }
    }

    fn try_cancel_owned(&mut self, mid_tick: Tick, out: &mut Vec<L3Message>) {
        for agent in self.agents.iter_mut() {
            agent.prune(&self.book);
        }
        let weights: Vec<(usize, f64)> = self
            .agents
            .iter()
            .enumerate()
            .map(|(i, a)| (i, a.owned_ids().len() as f64))
            .collect();
        let Some(idx) = weighted_choice_index(&mut self.rng, &weights) else {
            return;
        };
        if let Some(id) = self.agents[idx].pick_cancel(&self.book, mid_tick, &mut self.rng) {
            if self.cancel_and_emit(id, out) {
                self.agents[idx].on_removed(id);
            }
        }
    }

    fn stale_purge_sweep(&mut self, out: &mut Vec<L3Message>) {
        let mid_tick = tick::price_to_tick(self.state.mid_price, self.cfg.tick_size).unwrap_or(1);
        for i in 0..self.agents.len() {
            self.agents[i].prune(&self.book);
            let stale = self.agents[i].pull_stale(
                &self.book,
                mid_tick,
                self.cfg.stale_purge_distance,
                &mut self.rng,
            );
            for id in stale {
                if self.cancel_and_emit(id, out) {
                    self.agents[i].on_removed(id);
                }
            }
        }
    }

    fn end_of_day(&mut self) {
        self.book.clear();
        for agent in self.agents.iter_mut() {
            agent.clear();
        }
        self.state.mid_price = regime::overnight_gap(
            &mut self.rng,
            self.state.mid_price,
            self.cfg.overnight_gap_sigma,
        )
        .max(self.cfg.min_price);
        self.state.anchor_price = regime::daily_drift(
            &mut self.rng,
            self.state.anchor_price,
            self.cfg.daily_drift_sigma,
        )
        .max(self.cfg.min_price);
        self.state.momentum *= 0.3;
        self.state.regime = "normal".to_string();
        self.day += 1;
    }

    /// Submits `order`, emitting one `Execute` per resulting trade (in
    /// the order the matching loop produced them) and then, if LIMIT
    /// and residual quantity remains, one `Add` carrying the original
    /// submitted `price_tick`. On engine rejection the order is
    /// dropped and logged — a synthesis error must never halt the
    /// stream.
    fn emit_order(&mut self, order: Order, out: &mut Vec<L3Message>) {
        let id = order.id;
        let side = order.side;
        let order_type = order.order_type;
        let orig_qty = order.quantity;
        let price_tick = order.price_tick;

        if self.cfg.validate_orders {
            if let Err(e) = order.validate() {
                warn!(order_id = id, error = %e, "dropping invalid synthetic order");
                return;
            }
        }

        let trades = match self.book.add_order(order) {
            Ok(trades) => trades,
            Err(e) => {
                warn!(order_id = id, error = %e, "engine rejected synthetic order");
                return;
            }
        };

        for trade in &trades {
            self.t += 1;
            out.push(L3Message::Execute {
                timestamp: self.t,
                maker_id: trade.maker_id,
                price_tick: trade.price_tick,
                price: tick::tick_to_price(trade.price_tick, self.cfg.tick_size),
                quantity: trade.quantity,
                aggressor_side: side,
            });
        }

        let filled: u64 = trades.iter().map(|t| t.quantity).sum();
        let residual = orig_qty - filled;

        if order_type == OrderType::Limit && residual > 0 {
            let pt = price_tick.expect("validated LIMIT order carries a price_tick");
            self.t += 1;
            out.push(L3Message::Add {
                timestamp: self.t,
                order_id: id,
                side,
                price_tick: pt,
                price: tick::tick_to_price(pt, self.cfg.tick_size),
                quantity: residual,
            });
        }
    }

    fn cancel_and_emit(&mut self, order_id: u64, out: &mut Vec<L3Message>) -> bool {
        let Some(cancelled) = self.book.cancel_by_id_detailed(order_id) else {
            return false;
        };
        self.t += 1;
        out.push(L3Message::Cancel {
            timestamp: self.t,
            order_id,
            side: cancelled.side,
            price_tick: cancelled.price_tick,
            price: tick::tick_to_price(cancelled.price_tick, self.cfg.tick_size),
            cancelled_quantity: cancelled.order.quantity,
        });
        true
    }

    fn assign_random_owner(&mut self, order_id: u64) {
        if !self.book.contains_order(order_id) {
            return;
        }
        let idx = self.rng.random_range(0..self.agents.len());
        self.agents[idx].on_placed(order_id);
    }
}

fn weighted_choice_index(rng: &mut impl Rng, weighted: &[(usize, f64)]) -> Option<usize> {
    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut draw = rng.random::<f64>() * total;
    for &(idx, w) in weighted {
        if draw < w {
            return Some(idx);
        }
        draw -= w;
    }
    weighted.last().map(|&(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_populates_both_sides() {
        let cfg = SimConfig {
            seed_levels: 3,
            seed_orders_per_level: 2,
            ..SimConfig::default()
        };
        let mut driver = OrderFlowDriver::new(cfg);
        let msgs = driver.step_second();
        assert!(!msgs.is_empty());
        let (bids, asks) = driver.book().depth(10);
        assert!(!bids.is_empty());
        assert!(!asks.is_empty());
    }

    #[test]
    fn timestamps_are_strictly_increasing_and_dense() {
        let mut driver = OrderFlowDriver::new(SimConfig::default());
        let mut last = 0u64;
        for _ in 0..5 {
            for msg in driver.step_second() {
                let ts = msg.timestamp();
                assert!(ts > last);
                last = ts;
            }
        }
    }

    #[test]
    fn replay_with_same_seed_is_byte_identical() {
        let cfg1 = SimConfig {
            session_seconds: 30,
            ..SimConfig::default()
        };
        let cfg2 = cfg1.clone();
        let mut d1 = OrderFlowDriver::new(cfg1);
        let mut d2 = OrderFlowDriver::new(cfg2);

        let mut out1 = Vec::new();
        let mut out2 = Vec::new();
        for _ in 0..30 {
            out1.extend(d1.step_second());
            out2.extend(d2.step_second());
        }
        let json1 = serde_json::to_string(&out1).unwrap();
        let json2 = serde_json::to_string(&out2).unwrap();
        assert_eq!(json1, json2);
    }

    #[test]
    fn finite_num_days_eventually_stops_emitting() {
        let cfg = SimConfig {
            num_days: Some(1),
            session_seconds: 5,
            seed_levels: 1,
            seed_orders_per_level: 1,
            ..SimConfig::default()
        };
        let mut driver = OrderFlowDriver::new(cfg);
        for _ in 0..5 {
            driver.step_second();
        }
        assert!(driver.is_finished());
        assert!(driver.step_second().is_empty());
    }
}

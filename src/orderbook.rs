//! The in-memory limit order book: price levels, priority queues,
//! matching, cancellation.
//!
//! Internally each side keeps three things in lockstep:
//! - `*_levels`: `tick -> Level` (a FIFO of resting orders plus the
//!   level's aggregate quantity) — a [`HashMap`] rather than a sorted
//!   map, because price ordering is the priority heap's job, not the
//!   level map's.
//! - `*_heap`: a priority heap over ticks, giving the best tick in
//!   amortized O(1). Stale tops (ticks whose level has since emptied)
//!   are popped lazily on access rather than eagerly cleaned on
//!   removal — this keeps insertion O(log n) without a decrease-key
//!   operation (see DESIGN.md).
//! - `index`: `order_id -> (side, tick)`, giving O(1) cancel-by-id
//!   lookup; the FIFO scan to actually splice the order out is still
//!   O(depth of level), which real order-flow keeps small.
//!
//! Every public operation preserves the five invariants from the
//! module's design doc; in debug builds `debug_assert_invariants`
//! checks them after every mutation, and is compiled out in release.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use tracing::{info, trace};

use crate::{
    errors::EngineError,
    orders::{Order, OrderType, Side},
    tick::Tick,
    trade::Trade,
};

struct Level {
    orders: VecDeque<Order>,
    total_qty: u64,
}

impl Level {
    fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_qty: 0,
        }
    }
}

#[derive(Clone, Copy)]
struct OrderLocation {
    side: Side,
    tick: Tick,
}

/// An order removed by [`OrderBook::cancel_by_id`] or
/// [`OrderBook::cancel_at_price`], carrying everything the driver
/// needs to emit an L3 `Cancel` message — in particular the quantity
/// the order held *immediately before* removal (see the Open Question
/// resolution in DESIGN.md).
#[derive(Debug, Clone)]
pub struct CancelledOrder {
    pub order: Order,
    pub side: Side,
    pub price_tick: Tick,
}

/// One symbol's order book.
pub struct OrderBook {
    bid_levels: HashMap<Tick, Level>,
    ask_levels: HashMap<Tick, Level>,
    // Max-heap: natural `Ord` on `Tick` puts the highest bid at the top.
    bid_heap: BinaryHeap<Tick>,
    // Min-heap: `Reverse` flips ordering so the lowest ask is at the top.
    ask_heap: BinaryHeap<Reverse<Tick>>,
    index: HashMap<u64, OrderLocation>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bid_levels: HashMap::new(),
            ask_levels: HashMap::new(),
            bid_heap: BinaryHeap::new(),
            ask_heap: BinaryHeap::new(),
            index: HashMap::new(),
        }
    }

    /// Removes every resting order and resets all indices. Used at
    /// session/day boundaries.
    pub fn clear(&mut self) {
        self.bid_levels.clear();
        self.ask_levels.clear();
        self.bid_heap.clear();
        self.ask_heap.clear();
        self.index.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bid_levels.is_empty() && self.ask_levels.is_empty()
    }

    /// Appends an already-non-matching LIMIT order to its level's
    /// FIFO, creating the level (and pushing the heap entry) if this
    /// is the first order at that tick.
    ///
    /// Fails with [`EngineError::WrongType`] if `order` is MARKET or
    /// carries no `price_tick`.
    pub fn add_limit(&mut self, order: Order) -> Result<(), EngineError> {
        if order.order_type != OrderType::Limit {
            return Err(EngineError::WrongType(
                "add_limit requires a LIMIT order".into(),
            ));
        }
        let Some(tick) = order.price_tick else {
            return Err(EngineError::WrongType(
                "add_limit requires a price_tick".into(),
            ));
        };
        let side = order.side;
        let id = order.id;
        let qty = order.quantity;

        let (levels, is_new) = match side {
            Side::Bid => {
                let is_new = !self.bid_levels.contains_key(&tick);
                (&mut self.bid_levels, is_new)
            }
            Side::Ask => {
                let is_new = !self.ask_levels.contains_key(&tick);
                (&mut self.ask_levels, is_new)
            }
        };
        let level = levels.entry(tick).or_insert_with(Level::new);
        level.orders.push_back(order);
        level.total_qty += qty;

        if is_new {
            match side {
                Side::Bid => self.bid_heap.push(tick),
                Side::Ask => self.ask_heap.push(Reverse(tick)),
            }
        }
        self.index.insert(id, OrderLocation { side, tick });
        self.debug_assert_invariants();
        Ok(())
    }

    /// The public submission entry point.
    ///
    /// LIMIT orders match against the opposite side up to and
    /// including their own `price_tick`; any residual quantity rests
    /// on the book. MARKET orders match unconditionally until
    /// exhausted or the opposite book runs dry; residual quantity is
    /// dropped, never rested.
    pub fn add_order(&mut self, mut order: Order) -> Result<Vec<Trade>, EngineError> {
        match (order.order_type, order.price_tick) {
            (OrderType::Limit, None) => {
                return Err(EngineError::InvalidOrder(
                    "LIMIT requires a price_tick".into(),
                ));
            }
            (OrderType::Market, Some(_)) => {
                return Err(EngineError::InvalidOrder(
                    "MARKET must not carry a price_tick".into(),
                ));
            }
            _ => {}
        }

        let trades = self.match_order(&mut order);

        if order.order_type == OrderType::Limit && order.quantity > 0 {
            self.add_limit(order)?;
        }
        Ok(trades)
    }

    /// Internal matching loop shared by LIMIT and MARKET orders.
    ///
    /// At each step: lazily clean the opposite heap's top, stop if the
    /// opposite book is empty or (for LIMIT) the best opposite tick is
    /// beyond the aggressor's limit, otherwise trade against the FIFO
    /// head at that tick.
    fn match_order(&mut self, order: &mut Order) -> Vec<Trade> {
        trace!(order_id = order.id, qty = order.quantity, "matching order");
        let mut trades = Vec::new();
        let limit_tick = order.price_tick;

        loop {
            if order.quantity == 0 {
                break;
            }
            let Some(tick) = self.best_opposite_tick(order.side) else {
                break;
            };
            if let Some(lt) = limit_tick {
                let crossed = match order.side {
                    Side::Bid => tick > lt,
                    Side::Ask => tick < lt,
                };
                if crossed {
                    break;
                }
            }

            let levels = self.opposite_levels_mut(order.side);
            let level = levels
                .get_mut(&tick)
                .expect("heap top must reference a live level (invariant 4)");
            let head = level
                .orders
                .front_mut()
                .expect("non-empty FIFO invariant (invariant 2)");

            let traded_qty = order.quantity.min(head.quantity);
            trades.push(Trade {
                maker_id: head.id,
                price_tick: tick,
                quantity: traded_qty,
            });

            order.quantity -= traded_qty;
            head.quantity -= traded_qty;
            level.total_qty -= traded_qty;

            if head.quantity == 0 {
                let filled = level.orders.pop_front().expect("front just matched");
                self.index.remove(&filled.id);
            }
            if level.orders.is_empty() {
                levels.remove(&tick);
            }
        }

        if !trades.is_empty() {
            info!(order_id = order.id, trade_count = trades.len(), "matched");
        }
        self.debug_assert_invariants();
        trades
    }

    fn opposite_levels_mut(&mut self, side: Side) -> &mut HashMap<Tick, Level> {
        match side {
            Side::Bid => &mut self.ask_levels,
            Side::Ask => &mut self.bid_levels,
        }
    }

    fn best_opposite_tick(&mut self, side: Side) -> Option<Tick> {
        match side {
            Side::Bid => self.best_ask_tick(),
            Side::Ask => self.best_bid_tick(),
        }
    }

    fn best_bid_tick(&mut self) -> Option<Tick> {
        while let Some(&top) = self.bid_heap.peek() {
            if self.bid_levels.contains_key(&top) {
                return Some(top);
            }
            self.bid_heap.pop();
        }
        None
    }

    fn best_ask_tick(&mut self) -> Option<Tick> {
        while let Some(&Reverse(top)) = self.ask_heap.peek() {
            if self.ask_levels.contains_key(&top) {
                return Some(top);
            }
            self.ask_heap.pop();
        }
        None
    }

    /// Best bid tick and its aggregate resting quantity. Amortized
    /// O(1): lazily cleans the heap top before reading.
    pub fn best_bid(&mut self) -> Option<(Tick, u64)> {
        let tick = self.best_bid_tick()?;
        Some((tick, self.bid_levels[&tick].total_qty))
    }

    /// Best ask tick and its aggregate resting quantity.
    pub fn best_ask(&mut self) -> Option<(Tick, u64)> {
        let tick = self.best_ask_tick()?;
        Some((tick, self.ask_levels[&tick].total_qty))
    }

    /// Removes the FIFO head at `(side, tick)`. Returns `None` when no
    /// order rests at that level.
    pub fn cancel_at_price(&mut self, side: Side, tick: Tick) -> Option<Order> {
        let levels = match side {
            Side::Bid => &mut self.bid_levels,
            Side::Ask => &mut self.ask_levels,
        };
        let level = levels.get_mut(&tick)?;
        let removed = level.orders.pop_front()?;
        level.total_qty -= removed.quantity;
        self.index.remove(&removed.id);
        if level.orders.is_empty() {
            levels.remove(&tick);
        }
        self.debug_assert_invariants();
        Some(removed)
    }

    /// Looks up `order_id` in the global index, removes it from its
    /// FIFO with a single-pass rebuild, and drops the level if it
    /// empties. Returns `false` when the id is unknown or already
    /// gone — mutates nothing in that case.
    pub fn cancel_by_id(&mut self, order_id: u64) -> bool {
        self.cancel_by_id_detailed(order_id).is_some()
    }

    /// Same contract as [`Self::cancel_by_id`] but returns the removed
    /// order and its `(side, tick)`, so the driver can read the
    /// quantity the order held immediately before removal when it
    /// builds the L3 `Cancel` message.
    pub fn cancel_by_id_detailed(&mut self, order_id: u64) -> Option<CancelledOrder> {
        let loc = *self.index.get(&order_id)?;
        let levels = match loc.side {
            Side::Bid => &mut self.bid_levels,
            Side::Ask => &mut self.ask_levels,
        };
        let level = levels.get_mut(&loc.tick)?;
        let pos = level.orders.iter().position(|o| o.id == order_id)?;
        let removed = level.orders.remove(pos).expect("position just found");
        level.total_qty -= removed.quantity;
        if level.orders.is_empty() {
            levels.remove(&loc.tick);
        }
        self.index.remove(&order_id);
        self.debug_assert_invariants();
        Some(CancelledOrder {
            order: removed,
            side: loc.side,
            price_tick: loc.tick,
        })
    }

    /// Returns up to `n` levels per side: bids descending, asks
    /// ascending, each `(tick, aggregate_qty)`. Read-only; never
    /// mutates the book and is tolerant of stale heap tops since it
    /// walks the level maps directly rather than the priority heaps.
    pub fn depth(&self, n: usize) -> (Vec<(Tick, u64)>, Vec<(Tick, u64)>) {
        let mut bids: Vec<(Tick, u64)> = self
            .bid_levels
            .iter()
            .map(|(&t, l)| (t, l.total_qty))
            .collect();
        bids.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        bids.truncate(n);

        let mut asks: Vec<(Tick, u64)> = self
            .ask_levels
            .iter()
            .map(|(&t, l)| (t, l.total_qty))
            .collect();
        asks.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        asks.truncate(n);

        (bids, asks)
    }

    /// Distance, in ticks, from `mid_tick` to the best level on
    /// `side`. Used by the replenishment policy in the driver.
    pub fn distance_from_mid(&mut self, side: Side, mid_tick: Tick) -> Option<u64> {
        match side {
            Side::Bid => self
                .best_bid_tick()
                .map(|t| mid_tick.saturating_sub(t).max(t.saturating_sub(mid_tick))),
            Side::Ask => self
                .best_ask_tick()
                .map(|t| mid_tick.saturating_sub(t).max(t.saturating_sub(mid_tick))),
        }
    }

    pub fn contains_order(&self, order_id: u64) -> bool {
        self.index.contains_key(&order_id)
    }

    /// The resting tick of `order_id`, if it is still in the book.
    /// Used by agents to weigh cancel candidates by distance from mid.
    pub fn order_tick(&self, order_id: u64) -> Option<Tick> {
        self.index.get(&order_id).map(|loc| loc.tick)
    }

    #[cfg(debug_assertions)]
    fn debug_assert_invariants(&self) {
        if let (Some(&bb), Some(&Reverse(ba))) = (self.bid_heap.peek(), self.ask_heap.peek()) {
            if self.bid_levels.contains_key(&bb) && self.ask_levels.contains_key(&ba) {
                debug_assert!(bb < ba, "crossed book: bid {bb} >= ask {ba}");
            }
        }
        for (tick, level) in self.bid_levels.iter().chain(self.ask_levels.iter()) {
            debug_assert!(!level.orders.is_empty(), "empty level left at tick {tick}");
            let sum: u64 = level.orders.iter().map(|o| o.quantity).sum();
            debug_assert_eq!(
                sum, level.total_qty,
                "level_size mismatch at tick {tick}: {sum} != {}",
                level.total_qty
            );
            for o in &level.orders {
                debug_assert!(o.quantity > 0, "zero-quantity order {} resting", o.id);
            }
        }
        for (&id, loc) in self.index.iter() {
            let levels = match loc.side {
                Side::Bid => &self.bid_levels,
                Side::Ask => &self.ask_levels,
            };
            let level = levels
                .get(&loc.tick)
                .unwrap_or_else(|| panic!("index entry {id} points at a missing level"));
            debug_assert!(
                level.orders.iter().any(|o| o.id == id),
                "index entry {id} not found in its indexed level"
            );
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn debug_assert_invariants(&self) {}
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

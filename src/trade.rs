use serde::{Deserialize, Serialize};

use crate::tick::Tick;

/// A value record emitted each time an aggressor consumes liquidity
/// from a resting order. Trades are never stored in the book itself —
/// they are returned from `OrderBook::add_order` and wrapped into L3
/// `Execute` messages by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub maker_id: u64,
    pub price_tick: Tick,
    pub quantity: u64,
}

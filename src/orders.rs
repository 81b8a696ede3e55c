//! Value types for orders: sides, order types, and the `Order` itself.

use serde::{Deserialize, Serialize};

use crate::{errors::EngineError, tick::Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// A single order, resting or in-flight.
///
/// `id` is assigned by the driver (monotonically increasing,
/// non-negative). `quantity` only ever decreases once an order is
/// resting — fills and partial cancels are the only mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: u64,
    pub price_tick: Option<Tick>,
    pub timestamp: u64,
}

impl Order {
    pub fn limit(id: u64, side: Side, price_tick: Tick, quantity: u64, timestamp: u64) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::Limit,
            quantity,
            price_tick: Some(price_tick),
            timestamp,
        }
    }

    pub fn market(id: u64, side: Side, quantity: u64, timestamp: u64) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::Market,
            quantity,
            price_tick: None,
            timestamp,
        }
    }

    /// Validates the LIMIT/MARKET/price-tick contract and basic field
    /// ranges. Construction itself is always cheap (see `Order::limit`
    /// / `Order::market`); callers that want the safe-build behavior
    /// call this explicitly. The driver gates the call behind the
    /// `validate_orders` configuration flag.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.quantity == 0 {
            return Err(EngineError::InvalidOrder(format!(
                "order {}: quantity must be > 0",
                self.id
            )));
        }
        match (self.order_type, self.price_tick) {
            (OrderType::Limit, None) => Err(EngineError::InvalidOrder(format!(
                "order {}: LIMIT requires a price_tick",
                self.id
            ))),
            (OrderType::Market, Some(_)) => Err(EngineError::InvalidOrder(format!(
                "order {}: MARKET must not carry a price_tick",
                self.id
            ))),
            (OrderType::Limit, Some(tick)) if tick == 0 => Err(EngineError::InvalidOrder(
                format!("order {}: price_tick must be > 0", self.id),
            )),
            _ => Ok(()),
        }
    }
}

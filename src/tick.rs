//! Bijection between fractional prices and the integer tick domain.
//!
//! Everything inside the engine — storage, comparisons, the priority
//! heaps — operates on `Tick`. Floats only appear at the I/O boundary
//! (L3 messages, snapshots) for consumer convenience.

use crate::errors::EngineError;

/// An integer index on the configured price grid.
pub type Tick = u64;

/// Converts a fractional price into its tick index, rounding to the
/// nearest tick.
///
/// Fails with [`EngineError::InvalidPrice`] when `price <= 0.0` — the
/// engine never stores a non-positive tick.
pub fn price_to_tick(price: f64, tick_size: f64) -> Result<Tick, EngineError> {
    if !(price > 0.0) {
        return Err(EngineError::InvalidPrice(price.to_string()));
    }
    Ok((price / tick_size).round() as Tick)
}

/// Converts a tick index back to its float price equivalent.
pub fn tick_to_price(tick: Tick, tick_size: f64) -> f64 {
    tick as f64 * tick_size
}

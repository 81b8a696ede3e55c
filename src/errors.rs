use thiserror::Error;

/// Errors returned by the matching engine's public operations.
///
/// All of these are immediate, synchronous failures: the engine never
/// retries and never partially mutates state before returning one of
/// these (see `orderbook.rs` module docs).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A non-positive price was handed to `price_to_tick`.
    #[error("invalid price: {0} (must be > 0)")]
    InvalidPrice(String),

    /// An order's id/timestamp/quantity was out of range, or its
    /// LIMIT/MARKET/price-tick combination was self-contradictory.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// `add_limit` was given a MARKET order, or a LIMIT was routed into
    /// a market-only matching path.
    #[error("wrong order type: {0}")]
    WrongType(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

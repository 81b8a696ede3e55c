//! The level-3 (ITCH-like) message stream.
//!
//! `timestamp` here is the global sequence counter, incremented once
//! per emitted message — it is the canonical, strictly-increasing,
//! dense identifier consumers rely on. `price` is the
//! derived float equivalent of `price_tick`, carried for consumer
//! convenience; `price_tick` remains the canonical field.

use serde::{Deserialize, Serialize};

use crate::{orders::Side, tick::Tick};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msg_type")]
pub enum L3Message {
    #[serde(rename = "ADD")]
    Add {
        timestamp: u64,
        order_id: u64,
        side: Side,
        price_tick: Tick,
        price: f64,
        quantity: u64,
    },
    #[serde(rename = "EXECUTE")]
    Execute {
        timestamp: u64,
        maker_id: u64,
        price_tick: Tick,
        price: f64,
        quantity: u64,
        aggressor_side: Side,
    },
    #[serde(rename = "CANCEL")]
    Cancel {
        timestamp: u64,
        order_id: u64,
        side: Side,
        price_tick: Tick,
        price: f64,
        cancelled_quantity: u64,
    },
}

impl L3Message {
    pub fn timestamp(&self) -> u64 {
        match self {
            L3Message::Add { timestamp, .. }
            | L3Message::Execute { timestamp, .. }
            | L3Message::Cancel { timestamp, .. } => *timestamp,
        }
    }
}

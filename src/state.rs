//! Shared state handed to every axum route: the driver behind an
//! async mutex, and a broadcast channel the driving task publishes
//! every L3 message onto.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use crate::{config::SimConfig, driver::OrderFlowDriver, message::L3Message};

const L3_CHANNEL_CAPACITY: usize = 4096;

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<Mutex<OrderFlowDriver>>,
    pub l3_tx: broadcast::Sender<L3Message>,
}

impl AppState {
    pub fn new(cfg: SimConfig) -> Self {
        let (l3_tx, _) = broadcast::channel(L3_CHANNEL_CAPACITY);
        Self {
            driver: Arc::new(Mutex::new(OrderFlowDriver::new(cfg))),
            l3_tx,
        }
    }
}

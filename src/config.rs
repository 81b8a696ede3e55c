//! All simulation tunables in one place.
//!
//! One flat, serde-(de)serializable struct plus a named `RegimeParams`
//! table, loadable from a JSON file the same way the HTTP layer
//! round-trips JSON payloads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stochastic parameters for one named regime (`calm`, `normal`, `stress`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegimeParams {
    pub sigma: f64,
    pub jump_prob: f64,
    pub jump_sigma: f64,
    pub spread_mult: f64,
    pub market_ratio: f64,
    pub imbalance: f64,
}

/// Builds the three default regimes (`calm | normal | stress`).
pub fn default_regimes() -> HashMap<String, RegimeParams> {
    let mut m = HashMap::new();
    m.insert(
        "calm".to_string(),
        RegimeParams {
            sigma: 0.002,
            jump_prob: 0.0005,
            jump_sigma: 0.01,
            spread_mult: 0.7,
            market_ratio: 0.08,
            imbalance: 0.01,
        },
    );
    m.insert(
        "normal".to_string(),
        RegimeParams {
            sigma: 0.005,
            jump_prob: 0.002,
            jump_sigma: 0.03,
            spread_mult: 1.0,
            market_ratio: 0.15,
            imbalance: 0.0,
        },
    );
    m.insert(
        "stress".to_string(),
        RegimeParams {
            sigma: 0.02,
            jump_prob: 0.008,
            jump_sigma: 0.08,
            spread_mult: 1.6,
            market_ratio: 0.30,
            imbalance: -0.03,
        },
    );
    m
}

/// Every recognized simulation option.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub tick_size: f64,
    pub start_price: f64,
    pub spread: f64,
    pub min_price: f64,
    pub mean_reversion: f64,

    pub orders_per_tick: u64,
    pub market_ratio: f64,
    pub cancel_ratio: f64,

    pub seed: u64,

    pub replenish: bool,
    pub stale_purge_distance: u64,
    pub stale_purge_interval: u64,
    pub seed_levels: u64,
    pub seed_orders_per_level: u64,

    /// `None` means run forever.
    pub num_days: Option<u32>,
    pub session_seconds: u64,
    pub overnight_gap_sigma: f64,
    pub daily_drift_sigma: f64,

    pub regime_switch_prob: f64,
    pub regimes: HashMap<String, RegimeParams>,

    pub sleep_sec: f64,
    pub validate_orders: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_size: 0.01,
            start_price: 10.0,
            spread: 0.10,
            min_price: 1.0,
            mean_reversion: 0.001,

            orders_per_tick: 12,
            market_ratio: 0.12,
            cancel_ratio: 0.30,

            seed: 42,

            replenish: true,
            stale_purge_distance: 120,
            stale_purge_interval: 20,
            seed_levels: 20,
            seed_orders_per_level: 4,

            num_days: None,
            session_seconds: 23_400,
            overnight_gap_sigma: 0.010,
            daily_drift_sigma: 0.006,

            regime_switch_prob: 0.008,
            regimes: default_regimes(),

            sleep_sec: 0.0,
            validate_orders: false,
        }
    }
}

impl SimConfig {
    /// Parses a config from a JSON file, falling back to built-in
    /// defaults for any field the file omits.
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg = serde_json::from_str(&text)?;
        Ok(cfg)
    }

    pub fn regime(&self, name: &str) -> &RegimeParams {
        self.regimes
            .get(name)
            .unwrap_or_else(|| self.regimes.get("normal").expect("normal regime always present"))
    }
}

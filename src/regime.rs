//! Regime-switching stochastic mid-price process and intraday
//! seasonality curves.
//!
//! All randomness here is drawn from the single RNG the driver owns
//! and passes in by mutable reference — nothing in this module seeds
//! or owns its own generator, so replay determinism depends only on
//! the draw order below staying fixed (see `driver.rs`).

use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Normal};

use crate::config::SimConfig;

/// Mutable evolution state threaded through each tick of the session.
pub struct MidPriceState {
    pub mid_price: f64,
    pub anchor_price: f64,
    pub momentum: f64,
    pub regime: String,
}

impl MidPriceState {
    pub fn new(start_price: f64) -> Self {
        Self {
            mid_price: start_price,
            anchor_price: start_price,
            momentum: 0.0,
            regime: "normal".to_string(),
        }
    }
}

/// One tick of mid-price evolution: regime switch, shock, jump, drift.
///
/// Draw order is fixed: regime-switch roll, shock, jump-probability
/// roll (and its draw if triggered). Changing this order breaks
/// cross-run replay determinism even with an identical seed.
pub fn evolve(rng: &mut impl Rng, state: &mut MidPriceState, cfg: &SimConfig, vol_scale: f64) {
    if rng.random::<f64>() < cfg.regime_switch_prob {
        state.regime = choose_regime_name(rng, cfg);
    }

    let params = cfg.regime(&state.regime);

    let shock_dist = Normal::new(0.0, params.sigma * vol_scale).expect("sigma > 0");
    let shock = shock_dist.sample(rng);
    state.momentum = 0.95 * state.momentum + shock;

    let mut jump = 0.0;
    if rng.random::<f64>() < params.jump_prob {
        let jump_dist = Normal::new(0.0, params.jump_sigma * vol_scale).expect("jump_sigma > 0");
        jump = jump_dist.sample(rng);
    }

    let drift = cfg.mean_reversion * (state.anchor_price - state.mid_price) / state.anchor_price;

    state.mid_price *= (1.0 + shock + jump + drift).max(0.01);
    state.mid_price = state.mid_price.max(cfg.min_price);
}

fn choose_regime_name(rng: &mut impl Rng, cfg: &SimConfig) -> String {
    // Sorted rather than HashMap iteration order: the latter is
    // randomized per-process and would break cross-run replay
    // determinism even with an identical seed.
    let mut names: Vec<&String> = cfg.regimes.keys().collect();
    names.sort();
    let idx = rng.random_range(0..names.len());
    names[idx].clone()
}

/// Intraday activity factor: U-shaped, scales `orders_per_tick`. `tau`
/// is normalized session time in `[0, 1]`.
pub fn intraday_activity_factor(sec: u64, session_seconds: u64) -> f64 {
    let tau = sec as f64 / session_seconds as f64;
    let u = 4.0 * (tau - 0.5).powi(2);
    let open_boost = (1.0 - 5.0 * tau).max(0.0) * 0.5;
    let close_rush = ((tau - 0.85) / 0.15).max(0.0) * 0.3;
    (0.4 + 1.2 * u + open_boost + close_rush).clamp(0.3, 2.5)
}

/// Intraday volatility factor: U-shaped, scales `sigma` and
/// `jump_sigma`.
pub fn intraday_volatility_factor(sec: u64, session_seconds: u64) -> f64 {
    let tau = sec as f64 / session_seconds as f64;
    let u = 4.0 * (tau - 0.5).powi(2);
    let open_spike = if tau < 0.05 { 0.4 } else { 0.0 };
    (0.6 + 0.6 * u + open_spike).clamp(0.4, 2.0)
}

/// Overnight gap applied to the mid price at the session boundary.
pub fn overnight_gap(rng: &mut impl Rng, mid_price: f64, sigma: f64) -> f64 {
    let dist = Normal::new(0.0, sigma).expect("sigma > 0");
    mid_price * (1.0 + dist.sample(rng))
}

/// Daily anchor drift applied at the session boundary.
pub fn daily_drift(rng: &mut impl Rng, anchor_price: f64, sigma: f64) -> f64 {
    let dist = Normal::new(0.0, sigma).expect("sigma > 0");
    anchor_price * (1.0 + dist.sample(rng))
}

/// A weighted coin flip with probability `p` of `true`, clamped into
/// `[0, 1]` first — several call sites (side bias, market/limit split)
/// compute `p` from a formula that can stray outside the unit
/// interval before clamping.
pub fn bernoulli_clamped(rng: &mut impl Rng, p: f64) -> bool {
    let p = p.clamp(0.0, 1.0);
    Bernoulli::new(p).expect("clamped into [0, 1]").sample(rng)
}

/// A log-normal draw, `exp(N(mu, sigma))`, rounded and clamped to
/// `[lo, hi]`. Used throughout the driver for order and level sizes.
pub fn lognormal_clamped(rng: &mut impl Rng, mu: f64, sigma: f64, lo: u64, hi: u64) -> u64 {
    use rand_distr::LogNormal;
    let dist = LogNormal::new(mu, sigma).expect("valid log-normal params");
    (dist.sample(rng).round() as u64).clamp(lo, hi)
}

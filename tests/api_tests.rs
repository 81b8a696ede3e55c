//! Integration tests for the read-only HTTP snapshot endpoint.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use exchange_sim::{api::router, config::SimConfig, state::AppState};

fn test_app(cfg: SimConfig) -> Router {
    router(AppState::new(cfg))
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn quiet_config() -> SimConfig {
    // No seeding, no random flow: an untouched book to assert the
    // empty-snapshot shape against.
    SimConfig {
        seed_levels: 0,
        seed_orders_per_level: 0,
        orders_per_tick: 0,
        ..SimConfig::default()
    }
}

#[tokio::test]
async fn get_book_on_untouched_driver_is_empty() {
    let app = test_app(quiet_config());

    let res = app
        .oneshot(Request::builder().uri("/book").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let snap = body_json(res).await;
    assert_eq!(snap["seq"], 0);
    assert!(snap["bids"].as_array().unwrap().is_empty());
    assert!(snap["asks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn get_book_reflects_driver_state_after_stepping() {
    let cfg = SimConfig {
        seed_levels: 2,
        seed_orders_per_level: 1,
        orders_per_tick: 0,
        ..SimConfig::default()
    };
    let state = AppState::new(cfg);

    {
        let mut driver = state.driver.lock().await;
        driver.step_second();
    }

    let app = router(state.clone());
    let res = app
        .oneshot(Request::builder().uri("/book").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let snap = body_json(res).await;
    assert!(!snap["bids"].as_array().unwrap().is_empty());
    assert!(!snap["asks"].as_array().unwrap().is_empty());
    assert!(snap["seq"].as_u64().unwrap() > 0);

    // bids descending, asks ascending.
    let bids: Vec<f64> = snap["bids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|lvl| lvl[0].as_f64().unwrap())
        .collect();
    assert!(bids.windows(2).all(|w| w[0] >= w[1]));

    let asks: Vec<f64> = snap["asks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|lvl| lvl[0].as_f64().unwrap())
        .collect();
    assert!(asks.windows(2).all(|w| w[0] <= w[1]));

    let best_bid = bids.first().copied().unwrap();
    let best_ask = asks.first().copied().unwrap();
    assert!(best_bid < best_ask, "snapshot must not report a crossed book");
}

//! axum HTTP/WS shell around the order-flow driver: a read-only depth
//! snapshot and a streaming L3 feed. Single in-memory symbol; no
//! multi-pair routing (see DESIGN.md).

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

use crate::{state::AppState, tick};

const DEFAULT_DEPTH: usize = 20;

/// `{seq, bids:[(price, size)*], asks:[(price, size)*]}`.
#[derive(Serialize)]
pub struct BookSnapshotDto {
    pub seq: u64,
    pub bids: Vec<(f64, u64)>,
    pub asks: Vec<(f64, u64)>,
}

/// `GET /book` — a read-only depth snapshot, never mutates the driver.
pub async fn get_book(State(state): State<AppState>) -> impl IntoResponse {
    let driver = state.driver.lock().await;
    let tick_size = driver.tick_size();
    let (bids, asks) = driver.book().depth(DEFAULT_DEPTH);
    let snapshot = BookSnapshotDto {
        seq: driver.seq(),
        bids: bids
            .into_iter()
            .map(|(t, q)| (tick::tick_to_price(t, tick_size), q))
            .collect(),
        asks: asks
            .into_iter()
            .map(|(t, q)| (tick::tick_to_price(t, tick_size), q))
            .collect(),
    };
    Json(snapshot)
}

/// `GET /ws` — upgrades to a WebSocket and streams every L3 message
/// the driving task publishes, in emission order.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_l3(socket, state))
}

async fn stream_l3(mut socket: WebSocket, state: AppState) {
    let mut rx = state.l3_tx.subscribe();
    loop {
        match rx.recv().await {
            Ok(msg) => {
                let text = serde_json::to_string(&msg).expect("L3Message always serializes");
                if let Err(e) = socket.send(Message::Text(text.into())).await {
                    error!(error = %e, "websocket send failed");
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                info!(skipped, "ws client lagged, dropping skipped L3 messages");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Constructs the application's `Router` with all routes and shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/book", get(get_book))
        .route("/ws", get(ws_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(false)
                        .level(tracing::Level::TRACE),
                )
                .on_response(DefaultOnResponse::new().level(tracing::Level::TRACE)),
        )
        .with_state(state)
}

//! HTTP and WebSocket surface.
//!
//! Every WebSocket client is one subscriber on the shared hub; connecting or
//! disconnecting never touches the snapshot loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rp_risk::HistoryStore;
use rp_types::{config_error, HistoryPoint, RpResult, Symbol, SymbolList};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::fanout::SubscriberHub;
use crate::scheduler::SchedulerStats;

/// Shared state behind every route.
pub struct AppState {
    pub source: String,
    pub history: Arc<HistoryStore>,
    pub hub: SubscriberHub,
    pub stats: Arc<RwLock<SchedulerStats>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownSymbol(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub symbol: Symbol,
    pub capacity: usize,
    pub points: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub source: String,
    pub subscribers: usize,
    pub running: bool,
    pub stats: SchedulerStats,
}

pub fn router(state: Arc<AppState>, cors_origin: &str) -> RpResult<Router> {
    let origin: HeaderValue = cors_origin
        .parse()
        .map_err(|_| config_error!("invalid CORS origin '{}'", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/stocks", get(list_symbols))
        .route("/api/history/:symbol", get(symbol_history))
        .route("/health", get(health))
        .route("/ws/prices", get(ws_handler))
        .layer(cors)
        .with_state(state))
}

pub async fn list_symbols(State(state): State<Arc<AppState>>) -> Json<SymbolList> {
    Json(SymbolList {
        symbols: state.history.symbols().to_vec(),
    })
}

pub async fn symbol_history(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let symbol = Symbol::new(&symbol);
    let samples = state
        .history
        .snapshot(&symbol)
        .map_err(|_| ApiError::UnknownSymbol(symbol.to_string()))?;

    Ok(Json(HistoryResponse {
        symbol,
        capacity: state.history.capacity(),
        points: samples.iter().map(HistoryPoint::from).collect(),
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let running = !state.hub.is_closed();
    Json(HealthResponse {
        status: if running { "ok" } else { "stopped" }.to_string(),
        source: state.source.clone(),
        subscribers: state.hub.len(),
        running,
        stats: state.stats.read().clone(),
    })
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: SubscriberHub) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match hub.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => {
            debug!(error = %e, "websocket rejected");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            batch = subscription.next() => {
                let Some(batch) = batch else {
                    // loop stopped; tell the client
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&batch.to_message()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(tick = batch.tick, error = %e, "failed to encode batch");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    info!(
        subscriber = %subscription.id(),
        skipped = subscription.skipped(),
        "websocket closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn state() -> Arc<AppState> {
        let history = HistoryStore::new(3, vec![Symbol::new("RELIANCE"), Symbol::new("TCS")]).unwrap();
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        history.append(&Symbol::new("RELIANCE"), ts, 100.0).unwrap();

        Arc::new(AppState {
            source: "simulated".to_string(),
            history: Arc::new(history),
            hub: SubscriberHub::new(),
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
        })
    }

    #[tokio::test]
    async fn lists_tracked_symbols_in_order() {
        let Json(list) = list_symbols(State(state())).await;
        assert_eq!(list.symbols, vec![Symbol::new("RELIANCE"), Symbol::new("TCS")]);
    }

    #[tokio::test]
    async fn history_of_known_symbol() {
        let Json(body) = symbol_history(State(state()), Path("RELIANCE".to_string()))
            .await
            .unwrap();
        assert_eq!(body.capacity, 3);
        assert_eq!(body.points.len(), 1);
        assert_eq!(body.points[0].price, 100.0);
        assert_eq!(body.points[0].t, 1_700_000_000.0);
    }

    #[tokio::test]
    async fn history_of_unknown_symbol_is_not_found() {
        let err = symbol_history(State(state()), Path("WIPRO".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reflects_hub_state() {
        let state = state();
        let _sub = state.hub.subscribe().unwrap();

        let Json(body) = health(State(Arc::clone(&state))).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.subscribers, 1);
        assert!(body.running);

        state.hub.close();
        let Json(body) = health(State(state)).await;
        assert_eq!(body.status, "stopped");
        assert_eq!(body.subscribers, 0);
    }

    #[test]
    fn router_rejects_bad_origin() {
        assert!(router(state(), "http://localhost:5173").is_ok());
        assert!(router(state(), "bad\norigin").is_err());
    }
}

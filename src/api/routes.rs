use axum::{
    extract::{Path, Query, State, ws::{Message, WebSocket, WebSocketUpgrade}},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::debug;

use crate::core::domain::{PoolView, ViewParams};
use crate::refresh::coordinator::DashboardSnapshot;
use crate::refresh::source::SourceHealth;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let ui_dir = state.ui_dir.clone();
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/ws", get(ws_handler))
        .route("/api/pools", get(pools_handler))
        .route("/api/pools/*pool_id", get(pool_handler))
        .route("/api/sources", get(sources_handler))
        .nest_service("/ui", ServeDir::new(ui_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize, Debug)]
pub struct PoolsResponse {
    pub loading: bool,
    pub revision: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub pools: Vec<PoolView>,
}

impl PoolsResponse {
    /// Views for the snapshot's default identity unless `user` overrides it.
    fn from_snapshot(snapshot: &DashboardSnapshot, user: Option<&str>) -> Self {
        let pools = match user {
            Some(user) => snapshot.pools_for(Some(user)),
            None => snapshot.pools.clone(),
        };
        Self {
            loading: snapshot.loading,
            revision: snapshot.revision,
            refreshed_at: snapshot.refreshed_at,
            pools,
        }
    }
}

fn latest(state: &AppState) -> Arc<DashboardSnapshot> {
    state.snapshots.borrow().clone()
}

async fn pools_handler(State(state): State<Arc<AppState>>, Query(p): Query<ViewParams>) -> Json<PoolsResponse> {
    Json(PoolsResponse::from_snapshot(&latest(&state), p.user.as_deref()))
}

async fn pool_handler(
    State(state): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
    Query(p): Query<ViewParams>,
) -> impl IntoResponse {
    let response = PoolsResponse::from_snapshot(&latest(&state), p.user.as_deref());
    match response.pools.into_iter().find(|v| v.pool_id == pool_id) {
        Some(view) => Json(view).into_response(),
        None => (StatusCode::NOT_FOUND, format!("pool {} not found", pool_id)).into_response(),
    }
}

async fn sources_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SourceHealth>> {
    Json(latest(&state).sources.clone())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(p): Query<ViewParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, p.user))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.snapshots.clone();
    rx.mark_changed();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() { break; }
                let snapshot = rx.borrow_and_update().clone();
                let body = match serde_json::to_string(&PoolsResponse::from_snapshot(&snapshot, user.as_deref())) {
                    Ok(body) => body,
                    Err(e) => { debug!(event = "WS_SERIALIZE_FAILED", error = %e, "Snapshot serialization failed"); continue; }
                };
                if sender.send(Message::Text(body)).await.is_err() { break; }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

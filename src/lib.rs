//! Library crate wiring the realtime casual-games backend together.
//!
//! Mirrors the teacher's `lib.rs`/`AppState` pattern: a single `AppState`
//! holds every process-scoped service behind `Arc`, built once in `main`
//! and shared with every axum handler via `State`.

pub mod config;
pub mod engines;
pub mod error;
pub mod matchmaker;
pub mod models;
pub mod persistence;
pub mod registry;
pub mod rooms;
pub mod session;
pub mod settlement;
pub mod turnclock;
pub mod wallet;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use config::Settings;
use error::{AppError, AppResult};
use matchmaker::Matchmaker;
use persistence::Store;
use registry::ConnectionRegistry;
use rooms::RoomRegistry;
use session::auth::AuthProvider;
use session::SessionBus;
use settlement::Settlement;
use wallet::WalletLedger;

/// Every process-scoped collaborator, shared across axum handlers and the
/// matchmaker/room-actor background tasks (spec §9: "own them as
/// process-scoped services with explicit init and shutdown").
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub connections: Arc<ConnectionRegistry>,
    pub bus: Arc<SessionBus>,
    pub wallet: Arc<WalletLedger>,
    pub rooms: Arc<RoomRegistry>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    /// Resolves the single room a connection's current action targets.
    /// Inbound `rollDice`/`movePiece`/`selectCard` events carry no room id
    /// (spec §6) — the Connection Registry's reverse index is the source
    /// of truth for "which room is this user currently playing".
    pub async fn rooms_action(
        &self,
        user_id: Uuid,
        _connection: Uuid,
        action: engines::EngineAction,
    ) -> AppResult<()> {
        let mut rooms = self.connections.rooms_of_user(user_id);
        let room_id = rooms
            .drain()
            .next()
            .ok_or_else(|| AppError::State("not currently in a game room".to_string()))?;
        self.rooms.dispatch_action(user_id, room_id, action).await
    }
}

/// Builds every process-scoped service. Does not start the matchmaker
/// sweep or bind the listener — callers do that explicitly so tests can
/// construct an `AppState` without side effects.
pub fn build_state(
    settings: Arc<Settings>,
    store: Arc<dyn Store>,
    auth: Arc<dyn AuthProvider>,
) -> (Arc<AppState>, Arc<Matchmaker>) {
    let connections = Arc::new(ConnectionRegistry::new());
    let bus = Arc::new(SessionBus::new(connections.clone()));
    let wallet = Arc::new(WalletLedger::new(store.clone(), settings.clone()));
    let settlement = Arc::new(Settlement::new(wallet.clone()));
    let rooms = Arc::new(RoomRegistry::new(
        store.clone(),
        settings.clone(),
        bus.clone(),
        connections.clone(),
        settlement.clone(),
    ));
    let matchmaker = Arc::new(Matchmaker::new(store.clone(), settings.clone(), bus.clone(), rooms.clone()));

    let state = Arc::new(AppState {
        settings,
        store,
        connections,
        bus,
        wallet,
        rooms,
        auth,
    });
    (state, matchmaker)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(session::ws::upgrade))
        .route("/healthz", get(health))
        .route("/rooms/{room_id}", get(get_room))
        .route("/wallet/{user_id}", get(get_wallet))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn get_room(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(room_id): axum::extract::Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let room = state.store.get_room(room_id).await.map_err(AppError::Storage)?;
    let Some(room) = room else { return Err(AppError::NotFound(format!("room {room_id}"))) };
    let participants = state.store.get_participants(room_id).await.map_err(AppError::Storage)?;
    Ok(Json(serde_json::json!({ "room": room, "participants": participants })))
}

async fn get_wallet(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(user_id): axum::extract::Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let balance = state.wallet.balance(user_id).await?;
    let history = state.wallet.history(user_id).await?;
    Ok(Json(serde_json::json!({ "balance": balance, "history": history })))
}

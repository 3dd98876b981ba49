//! WebSocket upgrade handler and inbound dispatch (spec §4.3, §6).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engines::EngineAction;
use crate::models::QueueEntry;
use crate::AppState;

use super::events::{InboundEvent, OutboundEvent};

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    token: String,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    match state.auth.validate(&query.token) {
        Some(user_id) => ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)),
        None => (axum::http::StatusCode::UNAUTHORIZED, "invalid token").into_response(),
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundEvent>();

    state.connections.attach(connection_id, user_id);
    state.bus.register_connection(connection_id, tx);
    debug!(%connection_id, %user_id, "connection attached");

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else { continue };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else { continue };
        match serde_json::from_str::<InboundEvent>(&text) {
            Ok(event) => dispatch(&state, connection_id, user_id, event).await,
            Err(err) => {
                state.bus.send_to_connection(
                    connection_id,
                    OutboundEvent::Error { message: format!("malformed event: {err}") },
                );
            }
        }
    }

    writer.abort();
    state.bus.remove_connection(connection_id);
    if let Some((user, was_last)) = state.connections.detach(connection_id) {
        if was_last {
            state.connections.leave_all_rooms(user);
            state.rooms.notify_disconnected(user).await;
        }
    }
    debug!(%connection_id, %user_id, "connection detached");
}

async fn dispatch(state: &Arc<AppState>, connection: Uuid, user_id: Uuid, event: InboundEvent) {
    let result = match event {
        InboundEvent::JoinMatchmaking { game_type, max_players, entry_fee } => {
            join_matchmaking(state, user_id, game_type, max_players, entry_fee).await
        }
        InboundEvent::LeaveMatchmaking {} => leave_matchmaking(state, user_id).await,
        InboundEvent::JoinGameRoom { game_id } => {
            state.rooms.join_game_room(user_id, connection, game_id).await
        }
        InboundEvent::RollDice {} => state.rooms_action(user_id, connection, EngineAction::RollDice).await,
        InboundEvent::MovePiece { piece_id } => {
            state.rooms_action(user_id, connection, EngineAction::MovePiece { piece_id }).await
        }
        InboundEvent::SelectCard { position } => {
            state.rooms_action(user_id, connection, EngineAction::SelectCard { position }).await
        }
    };
    if let Err(err) = result {
        warn!(%connection, error = %err, "inbound event rejected");
        state.bus.send_to_connection(connection, OutboundEvent::Error { message: err.to_string() });
    }
}

async fn join_matchmaking(
    state: &Arc<AppState>,
    user_id: Uuid,
    game_type: crate::models::GameType,
    max_players: u8,
    entry_fee: rust_decimal::Decimal,
) -> crate::error::AppResult<()> {
    use crate::error::AppError;
    if entry_fee < state.settings.entry_fee_cap_min || entry_fee > state.settings.entry_fee_cap_max {
        return Err(AppError::Validation("entry fee outside the configured caps".into()));
    }
    if max_players < 2 || max_players > 4 {
        return Err(AppError::Validation("maxPlayers must be between 2 and 4".into()));
    }
    let entry = QueueEntry {
        id: Uuid::new_v4(),
        user_id,
        game_type,
        max_players,
        entry_fee,
        enqueued_at: chrono::Utc::now(),
    };
    state.store.enqueue(entry).await.map_err(AppError::Storage)?;
    state.bus.send_to_user(user_id, OutboundEvent::MatchmakingStatus { status: "waiting".to_string() });
    Ok(())
}

async fn leave_matchmaking(state: &Arc<AppState>, user_id: Uuid) -> crate::error::AppResult<()> {
    state.store.remove_queue_entry_for_user(user_id).await.map_err(crate::error::AppError::Storage)?;
    state.bus.send_to_user(user_id, OutboundEvent::MatchmakingStatus { status: "left".to_string() });
    Ok(())
}

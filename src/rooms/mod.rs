//! Room Registry & Lifecycle (spec §4.5, C5).
//!
//! Each room is a single-writer actor: a dedicated task drains a logical
//! inbox of inbound events, timer expiries, and lifecycle messages
//! strictly in order (spec §5). This module owns the registry of live
//! room actors; [`actor`] owns the per-room state machine itself.

pub mod actor;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::matchmaker::RoomSink;
use crate::models::{Participant, Room};
use crate::persistence::Store;
use crate::registry::ConnectionRegistry;
use crate::session::SessionBus;
use crate::settlement::Settlement;

pub use actor::RoomMessage;
pub use crate::engines::EngineAction as EngineActionRequest;

/// Seconds between room formation and the automatic `PLAYING` transition.
/// Gives clients a moment to receive `matchFound` and render the board.
const AUTO_START_DELAY_SECONDS: u64 = 3;

struct RoomHandle {
    inbox: mpsc::UnboundedSender<RoomMessage>,
}

type HandleMap = Arc<RwLock<HashMap<Uuid, RoomHandle>>>;

/// Process-scoped service owning every live room actor (spec §9).
pub struct RoomRegistry {
    handles: HandleMap,
    store: Arc<dyn Store>,
    settings: Arc<Settings>,
    bus: Arc<SessionBus>,
    connections: Arc<ConnectionRegistry>,
    settlement: Arc<Settlement>,
}

impl RoomRegistry {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<Settings>,
        bus: Arc<SessionBus>,
        connections: Arc<ConnectionRegistry>,
        settlement: Arc<Settlement>,
    ) -> Self {
        RoomRegistry {
            handles: Arc::new(RwLock::new(HashMap::new())),
            store,
            settings,
            bus,
            connections,
            settlement,
        }
    }

    /// Verifies `user` is a participant of `room_id`, joins the
    /// Connection Registry's room audience, and asks the room actor to
    /// emit current state to `connection` (spec §6 `joinGameRoom`).
    pub async fn join_game_room(&self, user: Uuid, connection: Uuid, room_id: Uuid) -> AppResult<()> {
        let participants = self
            .store
            .get_participants(room_id)
            .await
            .map_err(AppError::Storage)?;
        if !participants.iter().any(|p| p.user_id == user) {
            return Err(AppError::Authorization("not a participant of this room".into()));
        }
        self.connections.join_room(user, room_id);
        self.send(room_id, RoomMessage::PlayerJoined { user_id: user, connection })
            .await
    }

    pub async fn dispatch_action(&self, user: Uuid, room_id: Uuid, action: EngineActionRequest) -> AppResult<()> {
        self.send(room_id, RoomMessage::Action { user_id: user, action }).await
    }

    /// Cancels a still-WAITING room (spec §4.5 WAITING → CANCELLED).
    pub async fn cancel_room(&self, room_id: Uuid) -> AppResult<()> {
        self.send(room_id, RoomMessage::Cancel).await
    }

    /// Notifies every room the user currently has a reverse-index entry
    /// for that their last connection dropped (spec §4.5's 2-player
    /// forfeit rule; see `actor::RoomActor::handle`).
    pub async fn notify_disconnected(&self, user: Uuid) {
        for room_id in self.connections.rooms_of_user(user) {
            let _ = self.send(room_id, RoomMessage::Disconnected { user_id: user }).await;
        }
    }

    async fn send(&self, room_id: Uuid, message: RoomMessage) -> AppResult<()> {
        let handles = self.handles.read().await;
        match handles.get(&room_id) {
            Some(handle) => {
                let _ = handle.inbox.send(message);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("room {room_id} is not live"))),
        }
    }

    async fn spawn_actor(&self, room: Room, participants: Vec<Participant>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let room_id = room.id;
        self.handles.write().await.insert(room_id, RoomHandle { inbox: tx.clone() });

        let actor = actor::RoomActor::new(
            room,
            participants,
            self.store.clone(),
            self.settings.clone(),
            self.bus.clone(),
            self.connections.clone(),
            self.settlement.clone(),
            tx.clone(),
        );
        let handles = self.handles.clone();
        tokio::spawn(async move {
            actor.run(rx).await;
            handles.write().await.remove(&room_id);
        });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(AUTO_START_DELAY_SECONDS)).await;
            let _ = tx.send(RoomMessage::AutoStart);
        });
        info!(room_id = %room_id, "room actor spawned");
    }
}

#[async_trait::async_trait]
impl RoomSink for RoomRegistry {
    async fn room_formed(&self, room: Room, participants: Vec<Participant>) {
        let room_id = room.id;
        for p in &participants {
            self.connections.join_room(p.user_id, room_id);
            self.bus.send_to_user(
                p.user_id,
                crate::session::OutboundEvent::MatchFound {
                    game_id: room_id,
                    players: participants.iter().map(|x| x.user_id).collect(),
                    your_player_id: p.user_id,
                    your_seat: p.seat,
                    your_color: p.color.clone(),
                },
            );
        }
        self.spawn_actor(room, participants).await;
    }
}

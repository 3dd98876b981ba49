//! The per-room single-writer actor (spec §4.5, §5).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::engines::{self, EngineAction, EngineEvent, GameEngine};
use crate::models::{Room, RoomStatus, Participant};
use crate::persistence::Store;
use crate::registry::ConnectionRegistry;
use crate::session::{OutboundEvent, SessionBus};
use crate::settlement::Settlement;
use crate::turnclock::TurnClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockSlot {
    Turn,
    Match,
}

pub enum RoomMessage {
    AutoStart,
    PlayerJoined { user_id: Uuid, connection: Uuid },
    Action { user_id: Uuid, action: EngineAction },
    ClockExpired(ClockSlot),
    Disconnected { user_id: Uuid },
    /// Admin/operational cancellation of a room still in WAITING (spec
    /// §4.5: "match cancelled before start" -> refund all entries).
    Cancel,
}

pub struct RoomActor {
    room: Room,
    participants: Vec<Participant>,
    engine: Option<Box<dyn GameEngine>>,
    store: Arc<dyn Store>,
    settings: Arc<Settings>,
    bus: Arc<SessionBus>,
    connections: Arc<ConnectionRegistry>,
    settlement: Arc<Settlement>,
    self_tx: mpsc::UnboundedSender<RoomMessage>,
    turn_clock: TurnClock,
    match_clock: TurnClock,
    settled: bool,
    grace_started: bool,
}

impl RoomActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room: Room,
        participants: Vec<Participant>,
        store: Arc<dyn Store>,
        settings: Arc<Settings>,
        bus: Arc<SessionBus>,
        connections: Arc<ConnectionRegistry>,
        settlement: Arc<Settlement>,
        self_tx: mpsc::UnboundedSender<RoomMessage>,
    ) -> Self {
        RoomActor {
            room,
            participants,
            engine: None,
            store,
            settings,
            bus,
            connections,
            settlement,
            self_tx,
            turn_clock: TurnClock::new(),
            match_clock: TurnClock::new(),
            settled: false,
            grace_started: false,
        }
    }

    pub fn room_id(&self) -> Uuid {
        self.room.id
    }

    /// Drains the inbox strictly in order until the room is evicted
    /// (spec §5: "a dedicated worker drains it strictly in order").
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<RoomMessage>) {
        while let Some(message) = inbox.recv().await {
            self.handle(message).await;
            let terminal = matches!(self.room.status, RoomStatus::Finished | RoomStatus::Cancelled);
            if terminal && !self.grace_started {
                self.grace_started = true;
                self.start_grace_period();
            }
        }
    }

    fn start_grace_period(&self) {
        let grace = self.settings.room_grace_period;
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            drop(tx); // dropping the last clone closes the inbox, ending `run`.
        });
    }

    async fn handle(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::AutoStart => self.start_playing().await,
            RoomMessage::PlayerJoined { user_id, connection } => self.on_player_joined(user_id, connection).await,
            RoomMessage::Action { user_id, action } => self.on_action(user_id, action).await,
            RoomMessage::ClockExpired(slot) => self.on_clock_expired(slot).await,
            RoomMessage::Disconnected { user_id } => self.on_disconnected(user_id).await,
            RoomMessage::Cancel => self.on_cancel().await,
        }
    }

    async fn on_cancel(&mut self) {
        if self.room.status != RoomStatus::Waiting {
            return;
        }
        if let Err(err) = self.store.cancel_room(self.room.id).await {
            error!(room_id = %self.room.id, error = %err, "room cancellation refund failed");
            return;
        }
        self.room.status = RoomStatus::Cancelled;
        self.persist_snapshot().await;
        self.bus.send_to_room(
            self.room.id,
            OutboundEvent::GameEnded {
                winner_id: None,
                final_scores: self.participant_scores(),
                prize_pool: Default::default(),
            },
        );
    }

    async fn start_playing(&mut self) {
        if self.room.status != RoomStatus::Waiting {
            return;
        }
        self.room.status = RoomStatus::Playing;
        self.room.started_at = Some(chrono::Utc::now());
        let players: Vec<Uuid> = self.participants.iter().map(|p| p.user_id).collect();
        let mut engine = engines::init_engine(
            self.room.game_type,
            self.room.id,
            &players,
            self.settings.memory_default_pairs,
        );
        let initial_state = engine.snapshot();
        self.bus.send_to_room(self.room.id, OutboundEvent::GameStarted { initial_state });
        self.arm_turn_clock(engine.as_ref());
        self.arm_match_clock(engine.as_ref());
        self.engine = Some(engine);
        self.persist_snapshot().await;
    }

    async fn on_player_joined(&mut self, _user_id: Uuid, connection: Uuid) {
        let snapshot = self.engine.as_ref().map(|e| e.snapshot()).unwrap_or(self.room.engine_state.clone());
        self.bus.send_to_connection(
            connection,
            OutboundEvent::RoomState {
                room: serde_json::json!({
                    "roomId": self.room.id,
                    "status": format!("{:?}", self.room.status),
                    "gameType": format!("{:?}", self.room.game_type),
                    "prizePool": self.room.prize_pool,
                    "engineState": snapshot,
                }),
            },
        );
    }

    async fn on_action(&mut self, user_id: Uuid, action: EngineAction) {
        if self.room.status != RoomStatus::Playing {
            self.bus.send_to_user(user_id, OutboundEvent::Error { message: "room is not in play".into() });
            return;
        }
        if !self.participants.iter().any(|p| p.user_id == user_id) {
            self.bus.send_to_user(user_id, OutboundEvent::Error { message: "not a participant".into() });
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            self.bus.send_to_user(user_id, OutboundEvent::Error { message: "engine not initialised".into() });
            return;
        };
        match engine.apply(user_id, action) {
            Ok(events) => {
                self.sync_participant_scores();
                self.emit_engine_events(events);
                self.rearm_turn_clock();
                self.check_terminal().await;
                self.persist_snapshot().await;
            }
            Err(err) => {
                debug!(room_id = %self.room.id, error = %err.0, "engine rejected action");
                self.bus.send_to_user(user_id, OutboundEvent::Error { message: err.0 });
            }
        }
    }

    async fn on_clock_expired(&mut self, slot: ClockSlot) {
        if self.room.status != RoomStatus::Playing {
            return;
        }
        let Some(engine) = self.engine.as_mut() else { return };
        let events = match slot {
            ClockSlot::Turn => engine.on_timeout(),
            ClockSlot::Match => engine.force_match_timeout(),
        };
        self.sync_participant_scores();
        self.emit_engine_events(events);
        if slot == ClockSlot::Turn {
            self.rearm_turn_clock();
        }
        self.check_terminal().await;
        self.persist_snapshot().await;
    }

    /// Spec §4.5: "all-but-one participant disconnect for 2-player game"
    /// forfeits to the remaining online participant.
    async fn on_disconnected(&mut self, user_id: Uuid) {
        if self.room.status != RoomStatus::Playing || self.room.max_players != 2 {
            return;
        }
        let Some(other) = self.participants.iter().map(|p| p.user_id).find(|&u| u != user_id) else {
            return;
        };
        if self.connections.is_user_online(other) {
            self.finish_with_winner(other).await;
        }
    }

    fn emit_engine_events(&self, events: Vec<EngineEvent>) {
        for event in events {
            let outbound = match event {
                EngineEvent::TurnChanged { current_player } => OutboundEvent::TurnChanged { current_player_id: current_player },
                EngineEvent::TurnTimerStarted { total_seconds } => OutboundEvent::TurnTimer { total_seconds },
                EngineEvent::DiceRolled { player, value, movable_pieces } => {
                    OutboundEvent::DiceRolled { player_id: player, value, movable_pieces }
                }
                EngineEvent::PieceMoved { player, piece_id, captured_pieces, extra_turn } => {
                    OutboundEvent::PieceMoved {
                        player_id: player,
                        piece_id,
                        board_after: self.engine.as_ref().map(|e| e.snapshot()).unwrap_or_default(),
                        captured_pieces,
                        extra_turn,
                    }
                }
                EngineEvent::CardRevealed { position, symbol, by_player } => {
                    OutboundEvent::CardRevealed { position, symbol, by_player_id: by_player }
                }
                EngineEvent::CardsMatched { positions, by_player } => OutboundEvent::CardsMatched {
                    positions,
                    by_player_id: by_player,
                    scores: self.participant_scores(),
                },
                EngineEvent::CardsMismatched { positions, next_player } => {
                    OutboundEvent::CardsMismatched { positions, next_player_id: next_player }
                }
                EngineEvent::LifelineLost { player, remaining } => {
                    OutboundEvent::LifelineLost { player_id: player, remaining }
                }
                EngineEvent::PlayerEliminated { player } => OutboundEvent::PlayerEliminated { player_id: player },
            };
            self.bus.send_to_room(self.room.id, outbound);
        }
    }

    fn sync_participant_scores(&mut self) {
        let Some(engine) = self.engine.as_ref() else { return };
        let scores = engine.scores();
        for p in &mut self.participants {
            if let Some(&score) = scores.get(&p.user_id) {
                p.score = score;
            }
        }
    }

    fn participant_scores(&self) -> serde_json::Value {
        serde_json::json!(self
            .participants
            .iter()
            .map(|p| (p.user_id.to_string(), p.score))
            .collect::<std::collections::HashMap<_, _>>())
    }

    async fn check_terminal(&mut self) {
        let Some(engine) = self.engine.as_ref() else { return };
        let Some(terminal) = engine.is_terminal() else { return };
        self.turn_clock.cancel();
        self.match_clock.cancel();
        match terminal.winner {
            Some(winner) => self.finish_with_winner(winner).await,
            None => self.finish_with_winner(self.participants[0].user_id).await,
        }
    }

    async fn finish_with_winner(&mut self, winner: Uuid) {
        if self.room.status == RoomStatus::Finished {
            return;
        }
        self.room.status = RoomStatus::Finished;
        self.room.finished_at = Some(chrono::Utc::now());
        self.room.winner = Some(winner);
        self.turn_clock.cancel();
        self.match_clock.cancel();

        let final_scores = self.participant_scores();
        self.bus.send_to_room(
            self.room.id,
            OutboundEvent::GameEnded {
                winner_id: Some(winner),
                final_scores,
                prize_pool: self.room.prize_pool,
            },
        );
        self.persist_snapshot().await;
        self.settle(winner).await;
    }

    /// Idempotent (spec testable property 10 / §4.10): guarded both by
    /// `self.settled` for this actor's lifetime and by
    /// `WalletLedger::settle_winner`'s own ledger-level idempotency check,
    /// which also covers a restart mid-handler.
    async fn settle(&mut self, winner: Uuid) {
        if self.settled {
            return;
        }
        self.settled = true;
        if let Err(err) = self.settlement.settle(self.room.id, winner, self.room.prize_pool).await {
            error!(room_id = %self.room.id, error = %err, "settlement failed");
        }
    }

    fn arm_turn_clock(&mut self, engine: &dyn GameEngine) {
        let Some(seconds) = engine.turn_deadline_seconds() else {
            self.turn_clock.cancel();
            return;
        };
        self.start_turn_clock(seconds);
    }

    fn rearm_turn_clock(&mut self) {
        match self.engine.as_ref().and_then(|e| e.turn_deadline_seconds()) {
            Some(seconds) => self.start_turn_clock(seconds),
            None => self.turn_clock.cancel(),
        }
    }

    fn start_turn_clock(&mut self, seconds: u64) {
        let room_id = self.room.id;
        let bus = self.bus.clone();
        let tx = self.self_tx.clone();
        self.turn_clock.start(
            seconds,
            move |remaining| {
                if remaining == seconds {
                    bus.send_to_room(room_id, OutboundEvent::TurnTimer { total_seconds: seconds });
                } else {
                    bus.send_to_room(room_id, OutboundEvent::TimerUpdate { remaining });
                }
            },
            move || {
                let _ = tx.send(RoomMessage::ClockExpired(ClockSlot::Turn));
            },
        );
    }

    fn arm_match_clock(&mut self, engine: &dyn GameEngine) {
        let Some(seconds) = engine.match_duration_seconds() else { return };
        let room_id = self.room.id;
        let bus = self.bus.clone();
        let tx = self.self_tx.clone();
        self.match_clock.start(
            seconds,
            move |remaining| {
                if remaining == seconds {
                    bus.send_to_room(room_id, OutboundEvent::TurnTimer { total_seconds: seconds });
                } else {
                    bus.send_to_room(room_id, OutboundEvent::TimerUpdate { remaining });
                }
            },
            move || {
                let _ = tx.send(RoomMessage::ClockExpired(ClockSlot::Match));
            },
        );
    }

    async fn persist_snapshot(&mut self) {
        if let Some(engine) = self.engine.as_ref() {
            self.room.engine_state = engine.snapshot();
        }
        if let Err(err) = self.store.save_room_snapshot(&self.room).await {
            warn!(room_id = %self.room.id, error = %err, "failed to persist room snapshot");
        }
        for p in &self.participants {
            if let Err(err) = self.store.update_participant_score(self.room.id, p.user_id, p.score).await {
                warn!(room_id = %self.room.id, user = %p.user_id, error = %err, "failed to persist participant score");
            }
        }
    }
}


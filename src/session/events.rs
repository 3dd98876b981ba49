//! Inbound/outbound realtime event wire types (spec §6).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GameType;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum InboundEvent {
    JoinMatchmaking {
        game_type: GameType,
        max_players: u8,
        entry_fee: Decimal,
    },
    LeaveMatchmaking {},
    JoinGameRoom {
        game_id: Uuid,
    },
    RollDice {},
    MovePiece {
        piece_id: u8,
    },
    SelectCard {
        position: u8,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
#[allow(clippy::large_enum_variant)]
pub enum OutboundEvent {
    MatchmakingStatus {
        status: String,
    },
    MatchmakingError {
        message: String,
    },
    MatchFound {
        game_id: Uuid,
        players: Vec<Uuid>,
        your_player_id: Uuid,
        your_seat: u8,
        your_color: Option<String>,
    },
    GameStarted {
        initial_state: serde_json::Value,
    },
    TurnChanged {
        current_player_id: Uuid,
    },
    TurnTimer {
        total_seconds: u64,
    },
    TimerUpdate {
        remaining: u64,
    },
    DiceRolled {
        player_id: Uuid,
        value: u8,
        movable_pieces: Vec<u8>,
    },
    PieceMoved {
        player_id: Uuid,
        piece_id: u8,
        board_after: serde_json::Value,
        captured_pieces: Vec<u8>,
        extra_turn: bool,
    },
    CardRevealed {
        position: u8,
        symbol: u8,
        by_player_id: Uuid,
    },
    CardsMatched {
        positions: [u8; 2],
        by_player_id: Uuid,
        scores: serde_json::Value,
    },
    CardsMismatched {
        positions: [u8; 2],
        next_player_id: Uuid,
    },
    LifelineLost {
        player_id: Uuid,
        remaining: u8,
    },
    PlayerEliminated {
        player_id: Uuid,
    },
    GameEnded {
        winner_id: Option<Uuid>,
        final_scores: serde_json::Value,
        prize_pool: Decimal,
    },
    RoomState {
        room: serde_json::Value,
    },
    Error {
        message: String,
    },
}

//! Per-game state machines (spec §4.7–§4.9, §9, C7–C9).
//!
//! Spec §9 models the four games as variants of a `GameEngine` capability
//! so the room worker stays engine-agnostic: `init`, `apply`,
//! `onTimeout`, `isTerminal`, `snapshot`/`restore`. `apply`/`onTimeout`
//! are synchronous and side-effect-free beyond `&mut self` — all I/O
//! (persistence, wallet) happens in [`crate::rooms::actor`], not here.

pub mod ludo;
pub mod memory;
pub mod snakes_ladders;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GameType;

/// Inbound actions an engine may receive (spec §6: `rollDice`/`movePiece`/
/// `selectCard`). Engines reject actions outside their own vocabulary.
#[derive(Debug, Clone, Copy)]
pub enum EngineAction {
    RollDice,
    MovePiece { piece_id: u8 },
    SelectCard { position: u8 },
}

/// Outcomes an engine reports back to the room actor, mapped 1:1 onto the
/// outbound events in spec §6.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TurnChanged { current_player: Uuid },
    TurnTimerStarted { total_seconds: u64 },
    DiceRolled { player: Uuid, value: u8, movable_pieces: Vec<u8> },
    PieceMoved {
        player: Uuid,
        piece_id: u8,
        captured_pieces: Vec<u8>,
        extra_turn: bool,
    },
    CardRevealed { position: u8, symbol: u8, by_player: Uuid },
    CardsMatched { positions: [u8; 2], by_player: Uuid },
    CardsMismatched { positions: [u8; 2], next_player: Uuid },
    LifelineLost { player: Uuid, remaining: u8 },
    PlayerEliminated { player: Uuid },
}

/// An engine-level rejection (spec §7 "State" error class): wrong actor,
/// wrong phase, illegal selection. Never a panic.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Terminal outcome (spec §4.7/§4.8/§4.9 win conditions).
#[derive(Debug, Clone)]
pub struct Terminal {
    pub winner: Option<Uuid>,
    pub final_scores: HashMap<Uuid, i64>,
}

/// The capability every per-game state machine implements (spec §9).
pub trait GameEngine: Send + Sync {
    fn apply(&mut self, actor: Uuid, action: EngineAction) -> Result<Vec<EngineEvent>, EngineError>;

    /// Invoked when the room's current turn deadline expires. Spec §4.6:
    /// "invokes onExpire as a queued message to the room actor".
    fn on_timeout(&mut self) -> Vec<EngineEvent>;

    fn is_terminal(&self) -> Option<Terminal>;

    /// Current per-player scores, kept live so the room actor can mirror
    /// them onto `Participant::score` after every accepted action (spec
    /// §4.11: participant rows are part of a room's recoverable state).
    fn scores(&self) -> HashMap<Uuid, i64>;

    /// Seat index of the player whose action is currently accepted, if any
    /// (Classic Ludo between rolls, Memory between turns). `None` means no
    /// actor-specific gate (e.g. a global-clock Fast Ludo tick).
    fn current_actor(&self) -> Option<Uuid>;

    /// Seconds until `on_timeout` should fire for the *current* phase, or
    /// `None` if this engine has no outstanding per-turn deadline right
    /// now (Classic Ludo has none at all; Fast Ludo only during its
      /// no-legal-move auto-advance window).
    fn turn_deadline_seconds(&self) -> Option<u64>;

    /// Total duration of a whole-room clock this engine owns (Fast
    /// Ludo's 300s/600s match timer, spec §4.8). `None` for engines with
    /// no such clock — the default for everything but Fast Ludo.
    fn match_duration_seconds(&self) -> Option<u64> {
        None
    }

    /// Invoked when the match-duration clock (not a per-turn clock)
    /// expires. No-op for engines without one.
    fn force_match_timeout(&mut self) -> Vec<EngineEvent> {
        Vec::new()
    }

    fn snapshot(&self) -> serde_json::Value;
}

/// Deterministic seed for shuffles (spec §4.7, GLOSSARY "Seed"): derived
/// from the room id so state recovers without re-shuffling.
pub fn seed_from_room(room_id: Uuid) -> u64 {
    let bytes = room_id.as_bytes();
    let mut seed = 0u64;
    for (i, b) in bytes.iter().enumerate() {
        seed ^= (*b as u64).rotate_left((i as u32 * 8) % 64);
    }
    seed
}

/// Builds a fresh engine for a newly-PLAYING room.
pub fn init_engine(game_type: GameType, room_id: Uuid, players: &[Uuid], pair_count: u8) -> Box<dyn GameEngine> {
    let seed = seed_from_room(room_id);
    match game_type {
        GameType::Memory => Box::new(memory::MemoryEngine::new(seed, players, pair_count)),
        GameType::ClassicLudo => Box::new(ludo::LudoEngine::new(players, ludo::LudoVariant::Classic)),
        GameType::FastLudo => Box::new(ludo::LudoEngine::new(players, ludo::LudoVariant::Fast)),
        GameType::SnakesLadders => Box::new(snakes_ladders::SnakesLaddersEngine::new(players)),
    }
}

/// Restores an engine from a persisted snapshot (spec §8 "round-trip
/// laws": re-loading yields an equivalent state).
pub fn restore_engine(
    game_type: GameType,
    value: &serde_json::Value,
) -> anyhow::Result<Box<dyn GameEngine>> {
    Ok(match game_type {
        GameType::Memory => Box::new(memory::MemoryEngine::restore(value)?),
        GameType::ClassicLudo | GameType::FastLudo => Box::new(ludo::LudoEngine::restore(value)?),
        GameType::SnakesLadders => Box::new(snakes_ladders::SnakesLaddersEngine::restore(value)?),
    })
}

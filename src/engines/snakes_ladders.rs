//! Snakes & Ladders engine (spec §4.9, C9).

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EngineAction, EngineError, EngineEvent, GameEngine, Terminal};

const BOARD_SIZE: u8 = 100;
const ANIMATION_SECONDS: u64 = 3;

fn snakes_and_ladders() -> HashMap<u8, u8> {
    [
        (99, 21), (95, 75), (87, 24), (62, 19), (54, 34), (49, 11), (46, 25), (17, 7),
        (4, 14), (9, 31), (20, 38), (28, 84), (40, 59), (51, 67), (63, 81), (71, 91),
    ]
    .into_iter()
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlayerState {
    user_id: Uuid,
    position: u8,
}

pub struct SnakesLaddersEngine {
    players: Vec<PlayerState>,
    current_turn_index: usize,
    map: HashMap<u8, u8>,
    /// Set after a roll, cleared once the 3s animation window elapses;
    /// further rolls are rejected while `Some`.
    pending_advance: bool,
    winner: Option<Uuid>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    players: Vec<PlayerState>,
    current_turn_index: usize,
    pending_advance: bool,
    winner: Option<Uuid>,
}

impl SnakesLaddersEngine {
    pub fn new(players: &[Uuid]) -> Self {
        SnakesLaddersEngine {
            players: players.iter().map(|&user_id| PlayerState { user_id, position: 0 }).collect(),
            current_turn_index: 0,
            map: snakes_and_ladders(),
            pending_advance: false,
            winner: None,
        }
    }

    pub fn restore(value: &serde_json::Value) -> anyhow::Result<Self> {
        let snap: Snapshot = serde_json::from_value(value.clone())?;
        Ok(SnakesLaddersEngine {
            players: snap.players,
            current_turn_index: snap.current_turn_index,
            map: snakes_and_ladders(),
            pending_advance: snap.pending_advance,
            winner: snap.winner,
        })
    }

    fn actor(&self) -> Option<Uuid> {
        self.players.get(self.current_turn_index).map(|p| p.user_id)
    }

    fn advance_turn(&mut self) {
        self.current_turn_index = (self.current_turn_index + 1) % self.players.len();
        self.pending_advance = false;
    }
}

impl GameEngine for SnakesLaddersEngine {
    fn apply(&mut self, actor: Uuid, action: EngineAction) -> Result<Vec<EngineEvent>, EngineError> {
        let EngineAction::RollDice = action else {
            return Err(EngineError("snakes & ladders only accepts rollDice".into()));
        };
        if self.actor() != Some(actor) {
            return Err(EngineError("not your turn".into()));
        }
        if self.pending_advance {
            return Err(EngineError("movement animation in progress".into()));
        }
        let dice = rand::thread_rng().gen_range(1..=6u8);
        let idx = self.current_turn_index;
        let mut landing = self.players[idx].position.saturating_add(dice);
        if landing > BOARD_SIZE {
            landing = self.players[idx].position; // overshoot: stay in place
        } else if let Some(&mapped) = self.map.get(&landing) {
            landing = mapped;
        }
        self.players[idx].position = landing;
        self.pending_advance = true;
        if landing == BOARD_SIZE {
            self.winner = Some(actor);
        }
        Ok(vec![EngineEvent::DiceRolled {
            player: actor,
            value: dice,
            movable_pieces: vec![0],
        }])
    }

    fn on_timeout(&mut self) -> Vec<EngineEvent> {
        if self.winner.is_some() {
            return Vec::new();
        }
        self.advance_turn();
        self.actor()
            .map(|next| vec![EngineEvent::TurnChanged { current_player: next }])
            .unwrap_or_default()
    }

    fn is_terminal(&self) -> Option<Terminal> {
        self.winner.map(|winner| Terminal {
            winner: Some(winner),
            final_scores: self.players.iter().map(|p| (p.user_id, p.position as i64)).collect(),
        })
    }

    fn current_actor(&self) -> Option<Uuid> {
        self.actor()
    }

    fn scores(&self) -> HashMap<Uuid, i64> {
        self.players.iter().map(|p| (p.user_id, p.position as i64)).collect()
    }

    fn turn_deadline_seconds(&self) -> Option<u64> {
        self.pending_advance.then_some(ANIMATION_SECONDS)
    }

    fn snapshot(&self) -> serde_json::Value {
        let snap = Snapshot {
            players: self.players.clone(),
            current_turn_index: self.current_turn_index,
            pending_advance: self.pending_advance,
            winner: self.winner,
        };
        serde_json::to_value(snap).expect("snakes & ladders snapshot always serialises")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_rotate_strictly_even_on_a_six() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let mut engine = SnakesLaddersEngine::new(&[p1, p2]);
        engine.apply(p1, EngineAction::RollDice).unwrap();
        // rolling during the animation window is rejected.
        assert!(engine.apply(p1, EngineAction::RollDice).is_err());
        engine.on_timeout();
        assert_eq!(engine.current_actor(), Some(p2));
    }

    #[test]
    fn snake_and_ladder_map_matches_the_spec_default_table() {
        let engine = SnakesLaddersEngine::new(&[Uuid::new_v4(), Uuid::new_v4()]);
        assert_eq!(engine.map.get(&99).copied(), Some(21));
        assert_eq!(engine.map.get(&4).copied(), Some(14));
        assert_eq!(engine.map.get(&28).copied(), Some(84));
    }

    /// Rolling from a position close to 100 either relocates via the
    /// snake/ladder map or, on overshoot, leaves the piece exactly where
    /// it was — never past cell 100. Dice rolls are randomised inside
    /// `apply`, so this drives enough fresh engines to observe both
    /// branches rather than asserting one fixed roll.
    #[test]
    fn rolls_near_the_end_never_move_past_cell_100() {
        for _ in 0..50 {
            let p1 = Uuid::new_v4();
            let p2 = Uuid::new_v4();
            let mut engine = SnakesLaddersEngine::new(&[p1, p2]);
            engine.players[0].position = 98;
            engine.apply(p1, EngineAction::RollDice).unwrap();
            let landed = engine.players[0].position;
            assert!(landed <= BOARD_SIZE);
            if landed < 98 {
                // only reachable by landing on a mapped snake/ladder source
                assert!(engine.map.values().any(|&dest| dest == landed));
            }
        }
    }

    #[test]
    fn reaching_cell_100_is_a_win() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let mut engine = SnakesLaddersEngine::new(&[p1, p2]);
        engine.players[0].position = 100;
        engine.winner = Some(p1);
        let terminal = engine.is_terminal().unwrap();
        assert_eq!(terminal.winner, Some(p1));
    }

    #[test]
    fn snapshot_restore_round_trips_state() {
        let p1 = Uuid::new_v4();
        let mut engine = SnakesLaddersEngine::new(&[p1, Uuid::new_v4()]);
        engine.players[0].position = 42;
        let snap = engine.snapshot();
        let restored = SnakesLaddersEngine::restore(&snap).unwrap();
        assert_eq!(restored.scores(), engine.scores());
    }
}

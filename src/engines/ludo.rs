//! Ludo engine: Classic and Fast variants (spec §4.8, C8).

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EngineAction, EngineError, EngineEvent, GameEngine, Terminal};

const RING_LEN: u8 = 52;
const HOME_STRETCH_LEN: u8 = 6;
/// Last `Board` distance before a piece turns off the shared ring into its
/// own home column.
const HOME_ENTRY: u8 = RING_LEN - 1 - HOME_STRETCH_LEN; // 45
/// Total distance travelled from entry to finish — reaching exactly this
/// many steps (from `Board` or from the home column) finishes the piece.
const FINISH_DISTANCE: u8 = RING_LEN - 1; // 51
const ENTRIES: [u8; 4] = [0, 13, 26, 39];
const SAFE_CELLS: [u8; 8] = [0, 13, 26, 39, 8, 21, 34, 47];
const KILL_POINTS: i64 = 5;
const KILLED_PENALTY: i64 = 3;
const FINISH_TOKEN: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LudoVariant {
    Classic,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum PiecePos {
    Home,
    /// Distance travelled since entering the ring, 0..=45.
    Board(u8),
    /// Cell within the home stretch, 0..=4; reaching 5 finishes the piece.
    HomeStretch(u8),
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlayerState {
    user_id: Uuid,
    color: u8,
    pieces: [PiecePos; 4],
    score: i64,
    captures: u32,
}

impl PlayerState {
    fn finished_count(&self) -> u8 {
        self.pieces.iter().filter(|p| matches!(p, PiecePos::Finished)).count() as u8
    }

    fn abs_cell(&self, distance: u8) -> u8 {
        (ENTRIES[self.color as usize] + distance) % RING_LEN
    }
}

pub struct LudoEngine {
    variant: LudoVariant,
    players: Vec<PlayerState>,
    current_turn_index: usize,
    pending_roll: Option<u8>,
    movable: Vec<u8>,
    pending_auto_advance: bool,
    match_expired: bool,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    variant_is_fast: bool,
    players: Vec<PlayerState>,
    current_turn_index: usize,
    pending_roll: Option<u8>,
    movable: Vec<u8>,
    pending_auto_advance: bool,
    match_expired: bool,
}

impl LudoEngine {
    pub fn new(players: &[Uuid], variant: LudoVariant) -> Self {
        let starting = match variant {
            LudoVariant::Classic => PiecePos::Home,
            LudoVariant::Fast => PiecePos::Board(0),
        };
        LudoEngine {
            variant,
            players: players
                .iter()
                .enumerate()
                .map(|(seat, &user_id)| PlayerState {
                    user_id,
                    color: seat as u8,
                    pieces: [starting; 4],
                    score: 0,
                    captures: 0,
                })
                .collect(),
            current_turn_index: 0,
            pending_roll: None,
            movable: Vec::new(),
            pending_auto_advance: false,
            match_expired: false,
        }
    }

    pub fn restore(value: &serde_json::Value) -> anyhow::Result<Self> {
        let snap: Snapshot = serde_json::from_value(value.clone())?;
        Ok(LudoEngine {
            variant: if snap.variant_is_fast { LudoVariant::Fast } else { LudoVariant::Classic },
            players: snap.players,
            current_turn_index: snap.current_turn_index,
            pending_roll: snap.pending_roll,
            movable: snap.movable,
            pending_auto_advance: snap.pending_auto_advance,
            match_expired: snap.match_expired,
        })
    }

    fn actor(&self) -> Option<Uuid> {
        self.players.get(self.current_turn_index).map(|p| p.user_id)
    }

    fn advance_turn(&mut self) {
        self.current_turn_index = (self.current_turn_index + 1) % self.players.len();
        self.pending_roll = None;
        self.movable.clear();
        self.pending_auto_advance = false;
    }

    /// Computes which of the current actor's pieces have a legal move for
    /// `dice`, per spec §4.8's movement rules.
    fn compute_movable(&self, player_idx: usize, dice: u8) -> Vec<u8> {
        let p = &self.players[player_idx];
        (0u8..4)
            .filter(|&i| match p.pieces[i as usize] {
                PiecePos::Home => dice == 6 && self.variant == LudoVariant::Classic,
                PiecePos::Board(d) => d as u16 + dice as u16 <= FINISH_DISTANCE as u16,
                PiecePos::HomeStretch(d) => (d as u16 + dice as u16) < HOME_STRETCH_LEN as u16,
                PiecePos::Finished => false,
            })
            .collect()
    }

    /// Returns the captured pieces' indices (within their own owner), for
    /// reporting in `pieceMoved.capturedPieces`.
    fn apply_capture_if_any(&mut self, mover_idx: usize, landing_distance: u8) -> Vec<u8> {
        let abs = self.players[mover_idx].abs_cell(landing_distance);
        if SAFE_CELLS.contains(&abs) {
            return Vec::new();
        }
        let mut captured_piece_ids = Vec::new();
        for (other_idx, other) in self.players.iter_mut().enumerate() {
            if other_idx == mover_idx {
                continue;
            }
            for (piece_id, piece) in other.pieces.iter_mut().enumerate() {
                if let PiecePos::Board(d) = piece {
                    if other.abs_cell(*d) == abs {
                        *piece = match self.variant {
                            LudoVariant::Classic => PiecePos::Home,
                            // Open question (a): Fast Ludo returns captured
                            // pieces to their own colour's entry cell, not home.
                            LudoVariant::Fast => PiecePos::Board(0),
                        };
                        other.score = (other.score - KILLED_PENALTY).max(0);
                        captured_piece_ids.push(piece_id as u8);
                    }
                }
            }
        }
        if !captured_piece_ids.is_empty() {
            self.players[mover_idx].score += KILL_POINTS;
            self.players[mover_idx].captures += 1;
        }
        captured_piece_ids
    }
}

impl GameEngine for LudoEngine {
    fn apply(&mut self, actor: Uuid, action: EngineAction) -> Result<Vec<EngineEvent>, EngineError> {
        if self.actor() != Some(actor) {
            return Err(EngineError("not your turn".into()));
        }
        match action {
            EngineAction::RollDice => {
                if self.pending_roll.is_some() {
                    return Err(EngineError("dice already rolled this turn".into()));
                }
                let dice = rand::thread_rng().gen_range(1..=6u8);
                let idx = self.current_turn_index;
                let movable = self.compute_movable(idx, dice);
                self.pending_roll = Some(dice);
                self.movable = movable.clone();
                let mut events = vec![EngineEvent::DiceRolled {
                    player: actor,
                    value: dice,
                    movable_pieces: movable.clone(),
                }];
                if movable.is_empty() {
                    match self.variant {
                        LudoVariant::Classic => {
                            if dice == 6 {
                                // re-roll: same actor, clear the spent roll.
                                self.pending_roll = None;
                            } else {
                                self.advance_turn();
                                if let Some(next) = self.actor() {
                                    events.push(EngineEvent::TurnChanged { current_player: next });
                                }
                            }
                        }
                        LudoVariant::Fast => {
                            self.pending_auto_advance = true;
                        }
                    }
                }
                Ok(events)
            }
            EngineAction::MovePiece { piece_id } => {
                let Some(dice) = self.pending_roll else {
                    return Err(EngineError("roll the dice first".into()));
                };
                if !self.movable.contains(&piece_id) {
                    return Err(EngineError("piece is not movable".into()));
                }
                let idx = self.current_turn_index;
                let mut events = Vec::new();
                let mut finished_now = false;
                {
                    let piece = &mut self.players[idx].pieces[piece_id as usize];
                    *piece = match *piece {
                        PiecePos::Home => PiecePos::Board(0),
                        PiecePos::Board(d) => {
                            let nd = d + dice;
                            if nd <= HOME_ENTRY {
                                PiecePos::Board(nd)
                            } else if nd == FINISH_DISTANCE {
                                finished_now = true;
                                PiecePos::Finished
                            } else {
                                PiecePos::HomeStretch(nd - HOME_ENTRY - 1)
                            }
                        }
                        PiecePos::HomeStretch(d) => {
                            let nd = d + dice;
                            if nd == HOME_STRETCH_LEN - 1 {
                                finished_now = true;
                                PiecePos::Finished
                            } else {
                                PiecePos::HomeStretch(nd)
                            }
                        }
                        PiecePos::Finished => unreachable!("finished pieces are never movable"),
                    };
                }
                let captured_pieces = if let PiecePos::Board(d) = self.players[idx].pieces[piece_id as usize] {
                    self.apply_capture_if_any(idx, d)
                } else {
                    Vec::new()
                };
                if finished_now {
                    self.players[idx].score += FINISH_TOKEN;
                }
                events.push(EngineEvent::PieceMoved {
                    player: actor,
                    piece_id,
                    captured_pieces,
                    extra_turn: dice == 6,
                });
                if dice == 6 {
                    self.pending_roll = None;
                    self.movable.clear();
                } else {
                    self.advance_turn();
                    if let Some(next) = self.actor() {
                        events.push(EngineEvent::TurnChanged { current_player: next });
                    }
                }
                Ok(events)
            }
            EngineAction::SelectCard { .. } => Err(EngineError("ludo does not accept selectCard".into())),
        }
    }

    fn on_timeout(&mut self) -> Vec<EngineEvent> {
        // Only the Fast-Ludo no-legal-move auto-advance uses per-turn timeout.
        if self.pending_auto_advance {
            self.advance_turn();
            if let Some(next) = self.actor() {
                return vec![EngineEvent::TurnChanged { current_player: next }];
            }
        }
        Vec::new()
    }

    fn is_terminal(&self) -> Option<Terminal> {
        if let Some(p) = self.players.iter().find(|p| p.finished_count() == 4) {
            return Some(Terminal {
                winner: Some(p.user_id),
                final_scores: self.final_scores(),
            });
        }
        if self.variant == LudoVariant::Fast && self.match_expired {
            let winner = self.winner_by_fast_tiebreak();
            return Some(Terminal {
                winner,
                final_scores: self.final_scores(),
            });
        }
        None
    }

    fn current_actor(&self) -> Option<Uuid> {
        self.actor()
    }

    fn scores(&self) -> HashMap<Uuid, i64> {
        self.final_scores()
    }

    fn turn_deadline_seconds(&self) -> Option<u64> {
        if self.pending_auto_advance {
            Some(3)
        } else {
            None
        }
    }

    fn match_duration_seconds(&self) -> Option<u64> {
        if self.variant == LudoVariant::Fast {
            Some(if self.players.len() <= 2 { 300 } else { 600 })
        } else {
            None
        }
    }

    fn force_match_timeout(&mut self) -> Vec<EngineEvent> {
        self.match_expired = true;
        Vec::new()
    }

    fn snapshot(&self) -> serde_json::Value {
        let snap = Snapshot {
            variant_is_fast: self.variant == LudoVariant::Fast,
            players: self.players.clone(),
            current_turn_index: self.current_turn_index,
            pending_roll: self.pending_roll,
            movable: self.movable.clone(),
            pending_auto_advance: self.pending_auto_advance,
            match_expired: self.match_expired,
        };
        serde_json::to_value(snap).expect("ludo snapshot always serialises")
    }
}

impl LudoEngine {
    fn final_scores(&self) -> HashMap<Uuid, i64> {
        self.players.iter().map(|p| (p.user_id, p.score)).collect()
    }

    /// Open question (b): ties broken by more pieces finished, then by
    /// most captures.
    fn winner_by_fast_tiebreak(&self) -> Option<Uuid> {
        self.players
            .iter()
            .max_by_key(|p| (p.score, p.finished_count(), p.captures))
            .map(|p| p.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_players() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    /// Scenario 4 (spec §8): classic Ludo capture on a non-safe cell.
    /// Red at absolute cell 20 (not in SAFE_CELLS), blue lands on the same
    /// absolute cell and captures. Both distances stay within the ring
    /// window (0..=45) each colour can occupy before entering its own
    /// home stretch.
    #[test]
    fn classic_capture_on_non_safe_cell_sends_piece_home_and_scores() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Classic);
        assert!(!SAFE_CELLS.contains(&20));

        // red (color 0, entry 0): distance 20 -> abs cell 20.
        engine.players[0].pieces[0] = PiecePos::Board(20);
        // blue (color 1, entry 13): distance 6 -> abs 19; +1 dice -> abs 20.
        engine.players[1].pieces[0] = PiecePos::Board(6);
        engine.current_turn_index = 1;
        engine.pending_roll = Some(1);
        engine.movable = vec![0];

        let events = engine.apply(blue, EngineAction::MovePiece { piece_id: 0 }).unwrap();
        assert!(matches!(engine.players[0].pieces[0], PiecePos::Home));
        assert_eq!(engine.players[0].score, 0); // floored at 0, was already 0
        assert_eq!(engine.players[1].score, KILL_POINTS);
        assert!(events.iter().any(|e| matches!(e, EngineEvent::PieceMoved { captured_pieces, .. } if !captured_pieces.is_empty())));
    }

    #[test]
    fn safe_cell_forbids_capture() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Classic);
        // abs cell 21 is a safe cell.
        engine.players[0].pieces[0] = PiecePos::Board(21);
        engine.players[1].pieces[0] = PiecePos::Board(7); // (13+7+1)%52 = 21
        engine.current_turn_index = 1;
        engine.pending_roll = Some(1);
        engine.movable = vec![0];

        engine.apply(blue, EngineAction::MovePiece { piece_id: 0 }).unwrap();
        assert!(matches!(engine.players[0].pieces[0], PiecePos::Board(21)));
        assert_eq!(engine.players[1].score, 0);
    }

    #[test]
    fn fast_ludo_capture_returns_piece_to_entry_cell_not_home() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Fast);
        engine.players[0].pieces[0] = PiecePos::Board(20);
        engine.players[1].pieces[0] = PiecePos::Board(6);
        engine.current_turn_index = 1;
        engine.pending_roll = Some(1);
        engine.movable = vec![0];

        engine.apply(blue, EngineAction::MovePiece { piece_id: 0 }).unwrap();
        // Open question (a): Fast Ludo sends captured pieces to distance 0,
        // never to `Home` (Fast Ludo pieces never start there).
        assert_eq!(engine.players[0].pieces[0], PiecePos::Board(0));
    }

    #[test]
    fn finishing_a_piece_awards_finish_token_and_extra_turn_on_six() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Classic);
        engine.players[0].pieces[0] = PiecePos::HomeStretch(4);
        engine.current_turn_index = 0;
        engine.pending_roll = Some(1);
        engine.movable = vec![0];

        engine.apply(red, EngineAction::MovePiece { piece_id: 0 }).unwrap();
        assert!(matches!(engine.players[0].pieces[0], PiecePos::Finished));
        assert_eq!(engine.players[0].score, FINISH_TOKEN);
    }

    /// A piece at the last ring cell before the home column, rolling
    /// exactly enough to cover the whole home stretch in one move, lands
    /// precisely on the finish line instead of getting stuck mid-stretch.
    #[test]
    fn board_piece_finishes_on_an_exact_roll_into_home() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Classic);
        engine.players[0].pieces[0] = PiecePos::Board(45);
        engine.current_turn_index = 0;
        engine.pending_roll = Some(6);
        engine.movable = vec![0];

        engine.apply(red, EngineAction::MovePiece { piece_id: 0 }).unwrap();
        assert!(matches!(engine.players[0].pieces[0], PiecePos::Finished));
        assert_eq!(engine.players[0].score, FINISH_TOKEN);
    }

    /// Every home-stretch cell a `Board` move can land on stays movable —
    /// regression guard for the index arithmetic that once produced an
    /// unreachable `HomeStretch` state.
    #[test]
    fn entering_the_home_stretch_from_the_board_leaves_the_piece_movable() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Classic);
        engine.players[0].pieces[0] = PiecePos::Board(42);
        engine.current_turn_index = 0;
        engine.pending_roll = Some(4); // nd = 46 -> HomeStretch(0)
        engine.movable = vec![0];

        engine.apply(red, EngineAction::MovePiece { piece_id: 0 }).unwrap();
        assert_eq!(engine.players[0].pieces[0], PiecePos::HomeStretch(0));
        assert!(!engine.compute_movable(0, 3).is_empty());
    }

    #[test]
    fn rolling_a_six_grants_an_extra_turn() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Fast);
        engine.current_turn_index = 0;
        engine.pending_roll = Some(6);
        engine.movable = vec![0];

        engine.apply(red, EngineAction::MovePiece { piece_id: 0 }).unwrap();
        // actor keeps the turn: no TurnChanged, pending_roll cleared for re-roll
        assert_eq!(engine.current_actor(), Some(red));
        assert!(engine.pending_roll.is_none());
    }

    #[test]
    fn classic_terminal_requires_all_four_pieces_finished() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Classic);
        assert!(engine.is_terminal().is_none());
        for p in &mut engine.players[0].pieces {
            *p = PiecePos::Finished;
        }
        let terminal = engine.is_terminal().unwrap();
        assert_eq!(terminal.winner, Some(red));
    }

    #[test]
    fn fast_ludo_timer_win_uses_highest_score_then_tiebreaks() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Fast);
        engine.players[0].score = 23;
        engine.players[1].score = 17;
        engine.force_match_timeout();
        let terminal = engine.is_terminal().unwrap();
        assert_eq!(terminal.winner, Some(red));
    }

    #[test]
    fn snapshot_restore_round_trips_state() {
        let (red, blue) = two_players();
        let mut engine = LudoEngine::new(&[red, blue], LudoVariant::Classic);
        engine.players[0].pieces[0] = PiecePos::Board(5);
        engine.players[0].score = 7;
        let snap = engine.snapshot();
        let restored = LudoEngine::restore(&snap).unwrap();
        assert_eq!(restored.current_actor(), engine.current_actor());
        assert_eq!(restored.scores(), engine.scores());
    }
}

//! Room and participant (spec §3).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "game_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    ClassicLudo,
    FastLudo,
    Memory,
    SnakesLadders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
    Cancelled,
}

/// One game instance. `engine_state` is the opaque per-game snapshot
/// (spec §3 ownership note: "Room owns engineState"); it round-trips
/// through the `GameEngine::snapshot`/`restore` pair in `engines::`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub game_type: GameType,
    pub max_players: u8,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub status: RoomStatus,
    pub engine_state: serde_json::Value,
    pub current_turn_index: usize,
    pub winner: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Room {
    /// prizePool = 0.9 * entryFee * maxPlayers (spec §3, §10 "90%").
    ///
    /// Truncates toward zero (spec §4.1 monetary rounding rule), not
    /// `round_dp`'s banker's rounding — the platform never rounds a
    /// fraction of a cent in the house's favour.
    pub fn compute_prize_pool(entry_fee: Decimal, max_players: u8, platform_fee_rate: Decimal) -> Decimal {
        let pool_rate = Decimal::ONE - platform_fee_rate;
        (entry_fee * Decimal::from(max_players) * pool_rate).trunc_with_scale(2)
    }
}

/// A user's seat at a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub seat: u8,
    pub color: Option<String>,
    pub score: i64,
}

/// Colours assigned cyclically at matchmaking time (spec §4.4).
pub const SEAT_COLORS: [&str; 4] = ["red", "blue", "green", "yellow"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prize_pool_truncates_toward_zero_rather_than_rounding_up() {
        let entry_fee: Decimal = "10.05".parse().unwrap();
        let rate: Decimal = "0.10".parse().unwrap();
        // 10.05 * 3 * 0.9 = 27.135 -> truncates to 27.13, not round_dp's 27.14.
        let pool = Room::compute_prize_pool(entry_fee, 3, rate);
        assert_eq!(pool, "27.13".parse::<Decimal>().unwrap());
    }
}

//! Matchmaking queue entries (spec §3, §4.4).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::room::GameType;

/// A user's intent to join a game type at a given stake.
///
/// Invariant: at most one entry per user — enforced by the matchmaker
/// service (duplicate `enqueue` replaces the prior entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub game_type: GameType,
    pub max_players: u8,
    pub entry_fee: Decimal,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

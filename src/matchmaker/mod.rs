//! Matchmaker (spec §4.4, C4).
//!
//! A single periodic sweep task — "never runs two instances concurrently"
//! (spec §5) — grouping queue entries by `(gameType, maxPlayers,
//! entryFee)`, matching the oldest `maxPlayers` entries FIFO, and handing
//! formed rooms to the Room Registry (C5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::models::{GameType, Participant, Room, RoomStatus, SEAT_COLORS};
use crate::persistence::{MatchGroup, MatchOutcome, Store};
use crate::session::{OutboundEvent, SessionBus};

/// Callback surface the matchmaker hands freshly-formed rooms to. Kept as
/// a trait so the matchmaker never depends on the Room Registry's
/// concrete actor machinery — mirroring spec §9's "own them as
/// process-scoped services" note.
#[async_trait::async_trait]
pub trait RoomSink: Send + Sync {
    async fn room_formed(&self, room: Room, participants: Vec<Participant>);
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct GroupKey {
    game_type_tag: &'static str,
    max_players: u8,
    entry_fee: String,
}

fn group_key(game_type: GameType, max_players: u8, entry_fee: Decimal) -> GroupKey {
    GroupKey {
        game_type_tag: match game_type {
            GameType::ClassicLudo => "classic_ludo",
            GameType::FastLudo => "fast_ludo",
            GameType::Memory => "memory",
            GameType::SnakesLadders => "snakes_ladders",
        },
        max_players,
        entry_fee: entry_fee.normalize().to_string(),
    }
}

pub struct Matchmaker {
    store: Arc<dyn Store>,
    settings: Arc<Settings>,
    bus: Arc<SessionBus>,
    sink: Arc<dyn RoomSink>,
}

impl Matchmaker {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<Settings>,
        bus: Arc<SessionBus>,
        sink: Arc<dyn RoomSink>,
    ) -> Self {
        Matchmaker { store, settings, bus, sink }
    }

    /// Runs the periodic sweep forever. Intended to be `tokio::spawn`ed
    /// once from `main`.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.settings.matchmaker_tick);
        loop {
            interval.tick().await;
            // Immediate re-run on any match (spec §4.4): loop sweeping
            // until a pass produces nothing, then wait for the next tick.
            loop {
                match self.sweep_once().await {
                    Ok(matched_any) if matched_any => continue,
                    Ok(_) => break,
                    Err(err) => {
                        warn!(error = %err, "matchmaker sweep failed");
                        break;
                    }
                }
            }
        }
    }

    async fn sweep_once(&self) -> anyhow::Result<bool> {
        let entries = self.store.list_queue().await?;
        let mut groups: HashMap<GroupKey, Vec<_>> = HashMap::new();
        for entry in entries {
            let key = group_key(entry.game_type, entry.max_players, entry.entry_fee);
            groups.entry(key).or_default().push(entry);
        }

        // Largest pending count first (spec §4.4 tie-break).
        let mut candidates: Vec<_> = groups
            .into_iter()
            .filter(|(_, entries)| entries.len() >= entries.first().map(|e| e.max_players as usize).unwrap_or(usize::MAX))
            .collect();
        candidates.sort_by_key(|(_, entries)| std::cmp::Reverse(entries.len()));

        let mut matched_any = false;
        for (_, mut entries) in candidates {
            entries.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at).then(a.id.cmp(&b.id)));
            let max_players = entries[0].max_players as usize;
            while entries.len() >= max_players {
                let batch: Vec<_> = entries.drain(0..max_players).collect();
                if self.try_form(batch).await? {
                    matched_any = true;
                }
            }
        }
        Ok(matched_any)
    }

    /// Attempts to form one group; on `InsufficientBalance` drops only the
    /// offending entry and reports `false` (no match this round for that
    /// slot — spec §4.4 failure semantics).
    async fn try_form(&self, batch: Vec<crate::models::QueueEntry>) -> anyhow::Result<bool> {
        let first = &batch[0];
        let game_type = first.game_type;
        let max_players = first.max_players;
        let entry_fee = first.entry_fee;

        let prize_pool = Room::compute_prize_pool(entry_fee, max_players, self.settings.platform_fee_rate);
        let room_id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let room = Room {
            id: room_id,
            game_type,
            max_players,
            entry_fee,
            prize_pool,
            status: RoomStatus::Waiting,
            engine_state: serde_json::Value::Null,
            current_turn_index: 0,
            winner: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        };
        let participants: Vec<Participant> = batch
            .iter()
            .enumerate()
            .map(|(seat, entry)| Participant {
                user_id: entry.user_id,
                room_id,
                seat: seat as u8,
                color: Some(SEAT_COLORS[seat % SEAT_COLORS.len()].to_string()),
                score: 0,
            })
            .collect();

        let group = MatchGroup { entries: batch, room, participants: participants.clone() };
        match self.store.attempt_match(group).await? {
            MatchOutcome::Formed(room) => {
                info!(room_id = %room.id, game_type = ?room.game_type, "matchmaker formed room");
                self.sink.room_formed(room, participants).await;
                Ok(true)
            }
            MatchOutcome::InsufficientBalance { failed_entry_id, failed_user_id } => {
                debug!(user = %failed_user_id, "dropping queue entry with insufficient balance");
                self.store.remove_queue_entry(failed_entry_id).await?;
                self.bus.send_to_user(
                    failed_user_id,
                    OutboundEvent::MatchmakingError {
                        message: "insufficient balance for entry fee".to_string(),
                    },
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryStore;
    use crate::registry::ConnectionRegistry;
    use crate::session::SessionBus;
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_settings() -> Arc<Settings> {
        Arc::new(Settings {
            bind_addr: "127.0.0.1:0".into(),
            database_url: "memory".into(),
            gateway_hmac_secret: "s3cr3t".into(),
            entry_fee_cap_min: Decimal::ZERO,
            entry_fee_cap_max: "10000".parse().unwrap(),
            deposit_cap_min: "10".parse().unwrap(),
            deposit_cap_max: "50000".parse().unwrap(),
            min_withdrawal: "100".parse().unwrap(),
            platform_fee_rate: "0.10".parse().unwrap(),
            matchmaker_tick: Duration::from_secs(5),
            fast_ludo_timer_2p: Duration::from_secs(300),
            fast_ludo_timer_multi: Duration::from_secs(600),
            memory_turn_timer: Duration::from_secs(15),
            memory_lifelines: 3,
            memory_default_pairs: 15,
            room_grace_period: Duration::from_secs(120),
        })
    }

    #[derive(Default)]
    struct CapturingSink {
        formed: Mutex<Vec<(Room, Vec<Participant>)>>,
    }

    #[async_trait::async_trait]
    impl RoomSink for CapturingSink {
        async fn room_formed(&self, room: Room, participants: Vec<Participant>) {
            self.formed.lock().unwrap().push((room, participants));
        }
    }

    fn entry(user_id: Uuid, game_type: GameType, max_players: u8, entry_fee: Decimal, offset_ms: i64) -> crate::models::QueueEntry {
        crate::models::QueueEntry {
            id: Uuid::new_v4(),
            user_id,
            game_type,
            max_players,
            entry_fee,
            enqueued_at: chrono::Utc::now() + chrono::Duration::milliseconds(offset_ms),
        }
    }

    /// Scenario 1 (spec §8): two users queue for a free 2-player Memory
    /// room; a sweep forms exactly one room with both as participants.
    #[tokio::test]
    async fn forms_a_room_once_enough_entries_are_queued() {
        let store = Arc::new(InMemoryStore::new());
        let u1 = store.seed_user("u1", "+1", Decimal::ZERO).await;
        let u2 = store.seed_user("u2", "+2", Decimal::ZERO).await;
        store.enqueue(entry(u1.id, GameType::Memory, 2, Decimal::ZERO, 0)).await.unwrap();
        store.enqueue(entry(u2.id, GameType::Memory, 2, Decimal::ZERO, 10)).await.unwrap();

        let connections = Arc::new(ConnectionRegistry::new());
        let bus = Arc::new(SessionBus::new(connections));
        let sink = Arc::new(CapturingSink::default());
        let mm = Matchmaker::new(store.clone(), test_settings(), bus, sink.clone());

        let matched = mm.sweep_once().await.unwrap();
        assert!(matched);
        assert!(store.list_queue().await.unwrap().is_empty());

        let formed = sink.formed.lock().unwrap();
        assert_eq!(formed.len(), 1);
        let (room, participants) = &formed[0];
        assert_eq!(room.max_players, 2);
        let seats: std::collections::HashSet<_> = participants.iter().map(|p| p.seat).collect();
        assert_eq!(seats, [0, 1].into_iter().collect());
    }

    /// Scenario 2 (spec §8): a paid room debits both entry fees atomically.
    #[tokio::test]
    async fn debits_entry_fee_from_every_matched_participant() {
        let store = Arc::new(InMemoryStore::new());
        let fee: Decimal = "50".parse().unwrap();
        let u1 = store.seed_user("u1", "+1", "100".parse().unwrap()).await;
        let u2 = store.seed_user("u2", "+2", "100".parse().unwrap()).await;
        store.enqueue(entry(u1.id, GameType::ClassicLudo, 2, fee, 0)).await.unwrap();
        store.enqueue(entry(u2.id, GameType::ClassicLudo, 2, fee, 10)).await.unwrap();

        let connections = Arc::new(ConnectionRegistry::new());
        let bus = Arc::new(SessionBus::new(connections));
        let sink = Arc::new(CapturingSink::default());
        let mm = Matchmaker::new(store.clone(), test_settings(), bus, sink);

        mm.sweep_once().await.unwrap();
        assert_eq!(store.get_wallet(u1.id).await.unwrap().balance, "50".parse::<Decimal>().unwrap());
        assert_eq!(store.get_wallet(u2.id).await.unwrap().balance, "50".parse::<Decimal>().unwrap());
    }

    /// Spec §4.4: a debit failure drops only the offending entry and
    /// persists no debit for anyone in the group.
    #[tokio::test]
    async fn insufficient_balance_drops_only_the_offending_entry() {
        let store = Arc::new(InMemoryStore::new());
        let fee: Decimal = "50".parse().unwrap();
        let u1 = store.seed_user("u1", "+1", "10".parse().unwrap()).await; // can't afford
        let u2 = store.seed_user("u2", "+2", "100".parse().unwrap()).await;
        store.enqueue(entry(u1.id, GameType::ClassicLudo, 2, fee, 0)).await.unwrap();
        store.enqueue(entry(u2.id, GameType::ClassicLudo, 2, fee, 10)).await.unwrap();

        let connections = Arc::new(ConnectionRegistry::new());
        let bus = Arc::new(SessionBus::new(connections));
        let sink = Arc::new(CapturingSink::default());
        let mm = Matchmaker::new(store.clone(), test_settings(), bus, sink.clone());

        let matched = mm.sweep_once().await.unwrap();
        assert!(!matched);
        assert!(sink.formed.lock().unwrap().is_empty());
        // u1's entry was dropped, u2's remains queued for the next sweep.
        let remaining = store.list_queue().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, u2.id);
        assert_eq!(store.get_wallet(u1.id).await.unwrap().balance, "10".parse::<Decimal>().unwrap());
        assert_eq!(store.get_wallet(u2.id).await.unwrap().balance, "100".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn duplicate_enqueue_replaces_the_prior_entry() {
        let store = Arc::new(InMemoryStore::new());
        let u1 = store.seed_user("u1", "+1", Decimal::ZERO).await;
        store.enqueue(entry(u1.id, GameType::Memory, 2, Decimal::ZERO, 0)).await.unwrap();
        store.enqueue(entry(u1.id, GameType::FastLudo, 4, Decimal::ZERO, 0)).await.unwrap();

        let queue = store.list_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].game_type, GameType::FastLudo);
    }

    #[tokio::test]
    async fn does_not_match_below_the_required_player_count() {
        let store = Arc::new(InMemoryStore::new());
        let u1 = store.seed_user("u1", "+1", Decimal::ZERO).await;
        store.enqueue(entry(u1.id, GameType::Memory, 2, Decimal::ZERO, 0)).await.unwrap();

        let connections = Arc::new(ConnectionRegistry::new());
        let bus = Arc::new(SessionBus::new(connections));
        let sink = Arc::new(CapturingSink::default());
        let mm = Matchmaker::new(store.clone(), test_settings(), bus, sink.clone());

        let matched = mm.sweep_once().await.unwrap();
        assert!(!matched);
        assert_eq!(store.list_queue().await.unwrap().len(), 1);
    }
}

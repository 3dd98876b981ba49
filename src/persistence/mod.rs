//! Room Persistence (spec §4.11, C11).
//!
//! Durable storage behind a trait seam — the teacher never needed a
//! database (it reads from Solana RPC and a REST API), so this is sourced
//! from the wider ecosystem (`sqlx`) rather than invented. Two
//! implementations satisfy `Store`: [`postgres::PostgresStore`] for
//! production and [`memory::InMemoryStore`] as the deterministic double
//! used by tests and local runs without a database.
//!
//! A room's full state is recoverable from `(room row + participants +
//! latest engine-state snapshot)` as required by spec §4.11; writes from
//! a room actor are serialised per room and never span rooms.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{LedgerEntry, LedgerKind, Participant, QueueEntry, Room, User, Wallet};

/// Input to one matchmaker group-formation attempt (spec §4.4 step 2).
#[derive(Debug, Clone)]
pub struct MatchGroup {
    pub entries: Vec<QueueEntry>,
    pub room: Room,
    pub participants: Vec<Participant>,
}

/// Result of [`Store::attempt_match`].
#[derive(Debug)]
pub enum MatchOutcome {
    /// The room and its participants were created; queue entries deleted.
    Formed(Room),
    /// One entry's debit failed; the whole transaction was rolled back.
    /// The matchmaker removes only this entry and tries the next group.
    InsufficientBalance { failed_entry_id: Uuid, failed_user_id: Uuid },
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- users & wallets -------------------------------------------------
    async fn create_user(&self, display_name: &str, phone: &str) -> anyhow::Result<User>;
    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>>;
    async fn get_wallet(&self, user_id: Uuid) -> anyhow::Result<Wallet>;

    // --- ledger primitives (each one atomic storage transaction) --------
    /// Inserts a PENDING ledger row only (spec: `reserveDeposit`,
    /// `requestWithdrawal`'s hold). Does not touch the balance.
    async fn insert_pending_ledger(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
        receipt: Option<String>,
    ) -> anyhow::Result<Uuid>;

    /// Immediately records a COMPLETED entry and mutates the balance in one
    /// transaction (spec: `credit`/`debit`). Errors if the resulting
    /// balance would be negative.
    async fn direct_mutate(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
    ) -> anyhow::Result<(Decimal, Uuid)>;

    /// Transitions a PENDING entry to COMPLETED and applies its signed
    /// amount to the balance, in one transaction. Errors if the entry is
    /// not PENDING, or if completion would drive the balance negative.
    /// `receipt`, when given, is persisted onto the entry so a later
    /// `find_completed_by_receipt` can recognise a duplicate confirmation
    /// (spec §4.1: "no two COMPLETED entries share a gateway receipt").
    async fn complete_ledger(&self, ledger_id: Uuid, receipt: Option<&str>) -> anyhow::Result<Decimal>;

    /// Transitions a PENDING entry to FAILED. No balance effect.
    async fn fail_ledger(&self, ledger_id: Uuid) -> anyhow::Result<()>;

    /// Transitions a PENDING entry to FAILED (or CANCELLED, depending on
    /// `terminal_status`) and inserts+completes a compensating REFUND
    /// credit, all in one transaction.
    async fn cancel_with_refund(
        &self,
        ledger_id: Uuid,
        terminal_cancelled: bool,
    ) -> anyhow::Result<(Decimal, Uuid)>;

    async fn get_ledger(&self, ledger_id: Uuid) -> anyhow::Result<Option<LedgerEntry>>;
    async fn find_completed_by_receipt(&self, receipt: &str) -> anyhow::Result<Option<LedgerEntry>>;
    async fn find_settlement(&self, room_id: Uuid) -> anyhow::Result<Option<LedgerEntry>>;
    async fn list_ledger_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<LedgerEntry>>;
    async fn sum_refunds_for_room(&self, room_id: Uuid) -> anyhow::Result<Decimal>;
    async fn sum_entries_for_room(&self, room_id: Uuid) -> anyhow::Result<Decimal>;

    // --- matchmaking queue (spec §4.4) -----------------------------------
    /// Inserts an entry; replaces any prior entry for the same user
    /// (remove-then-insert, spec's duplicate-enqueue semantics).
    async fn enqueue(&self, entry: QueueEntry) -> anyhow::Result<()>;
    async fn remove_queue_entry(&self, entry_id: Uuid) -> anyhow::Result<()>;
    async fn remove_queue_entry_for_user(&self, user_id: Uuid) -> anyhow::Result<Option<QueueEntry>>;
    async fn list_queue(&self) -> anyhow::Result<Vec<QueueEntry>>;

    /// Attempts to form one matched group atomically (spec §4.4 step 2):
    /// debits every paid entry, creates the room + participants, deletes
    /// the matched queue entries — all in one serializable transaction,
    /// or none of it.
    async fn attempt_match(&self, group: MatchGroup) -> anyhow::Result<MatchOutcome>;

    // --- rooms (spec §4.5, §4.11) ----------------------------------------
    async fn get_room(&self, room_id: Uuid) -> anyhow::Result<Option<Room>>;
    async fn get_participants(&self, room_id: Uuid) -> anyhow::Result<Vec<Participant>>;
    /// Last-writer-wins snapshot persist, called after every accepted
    /// room mutation (spec §4.5, §5).
    async fn save_room_snapshot(&self, room: &Room) -> anyhow::Result<()>;
    async fn update_participant_score(&self, room_id: Uuid, user_id: Uuid, score: i64) -> anyhow::Result<()>;
    /// Refunds every GAME_ENTRY debit for a cancelled room (spec §4.5
    /// WAITING -> CANCELLED transition), one transaction per participant
    /// refund as `cancel_with_refund` already guarantees atomicity with
    /// the wallet mutation; the room status flip is separate and
    /// idempotent at the caller.
    async fn cancel_room(&self, room_id: Uuid) -> anyhow::Result<()>;
}

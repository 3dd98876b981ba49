//! In-memory [`Store`] — the deterministic double used by tests and by
//! local runs without a Postgres instance. Keeps the same atomicity
//! guarantees as the Postgres implementation by serialising every
//! operation behind one `tokio::sync::Mutex` over the whole dataset;
//! spec §5 only requires that *wallet* mutations be serializable
//! transactions, and a single mutex trivially satisfies that for a
//! single-process test double.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{LedgerEntry, LedgerKind, LedgerStatus, Participant, QueueEntry, Room, RoomStatus, User, Wallet};

use super::{MatchGroup, MatchOutcome, Store};

#[derive(Default)]
struct Data {
    users: HashMap<Uuid, User>,
    wallets: HashMap<Uuid, Wallet>,
    ledger: HashMap<Uuid, LedgerEntry>,
    queue: HashMap<Uuid, QueueEntry>,
    rooms: HashMap<Uuid, Room>,
    participants: HashMap<Uuid, Vec<Participant>>,
}

pub struct InMemoryStore {
    data: Arc<Mutex<Data>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            data: Arc::new(Mutex::new(Data::default())),
        }
    }

    /// Seeds a user + zero-balance wallet directly, bypassing OTP signup —
    /// used by tests that need a known starting balance.
    pub async fn seed_user(&self, display_name: &str, phone: &str, balance: Decimal) -> User {
        let mut data = self.data.lock().await;
        let user = User {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            phone: phone.to_string(),
            verified: true,
            created_at: chrono::Utc::now(),
        };
        data.users.insert(user.id, user.clone());
        data.wallets.insert(
            user.id,
            Wallet {
                user_id: user.id,
                balance,
            },
        );
        user
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_signed(wallet: &mut Wallet, kind: LedgerKind, amount: Decimal) -> anyhow::Result<()> {
    let signed = if kind.is_credit() { amount } else { -amount };
    let next = wallet.balance + signed;
    if next < Decimal::ZERO {
        anyhow::bail!("balance would go negative");
    }
    wallet.balance = next;
    Ok(())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, display_name: &str, phone: &str) -> anyhow::Result<User> {
        let mut data = self.data.lock().await;
        let user = User {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            phone: phone.to_string(),
            verified: true,
            created_at: chrono::Utc::now(),
        };
        data.users.insert(user.id, user.clone());
        data.wallets.insert(user.id, Wallet::new(user.id));
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.data.lock().await.users.get(&user_id).cloned())
    }

    async fn get_wallet(&self, user_id: Uuid) -> anyhow::Result<Wallet> {
        let data = self.data.lock().await;
        data.wallets
            .get(&user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("wallet not found for {}", user_id))
    }

    async fn insert_pending_ledger(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
        receipt: Option<String>,
    ) -> anyhow::Result<Uuid> {
        let mut data = self.data.lock().await;
        let id = Uuid::new_v4();
        data.ledger.insert(
            id,
            LedgerEntry {
                id,
                user_id,
                kind,
                amount,
                status: LedgerStatus::Pending,
                game_ref,
                receipt,
                created_at: chrono::Utc::now(),
            },
        );
        Ok(id)
    }

    async fn direct_mutate(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
    ) -> anyhow::Result<(Decimal, Uuid)> {
        let mut data = self.data.lock().await;
        let mut wallet = data
            .wallets
            .get(&user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("wallet not found for {}", user_id))?;
        apply_signed(&mut wallet, kind, amount)?;
        let id = Uuid::new_v4();
        data.ledger.insert(
            id,
            LedgerEntry {
                id,
                user_id,
                kind,
                amount: if kind.is_credit() { amount } else { -amount },
                status: LedgerStatus::Completed,
                game_ref,
                receipt: None,
                created_at: chrono::Utc::now(),
            },
        );
        data.wallets.insert(user_id, wallet.clone());
        Ok((wallet.balance, id))
    }

    async fn complete_ledger(&self, ledger_id: Uuid, receipt: Option<&str>) -> anyhow::Result<Decimal> {
        let mut data = self.data.lock().await;
        let entry = data
            .ledger
            .get(&ledger_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("ledger entry not found"))?;
        if entry.status != LedgerStatus::Pending {
            anyhow::bail!("ledger entry {} is not PENDING", ledger_id);
        }
        if let Some(r) = receipt {
            if data
                .ledger
                .values()
                .any(|e| e.status == LedgerStatus::Completed && e.receipt.as_deref() == Some(r))
            {
                anyhow::bail!("receipt {} already completed on another entry", r);
            }
        }
        let mut wallet = data
            .wallets
            .get(&entry.user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("wallet not found for {}", entry.user_id))?;
        apply_signed(&mut wallet, entry.kind, entry.amount.abs())?;
        data.wallets.insert(entry.user_id, wallet.clone());
        let mut updated = entry;
        updated.status = LedgerStatus::Completed;
        updated.amount = if updated.kind.is_credit() {
            updated.amount.abs()
        } else {
            -updated.amount.abs()
        };
        if let Some(r) = receipt {
            updated.receipt = Some(r.to_string());
        }
        data.ledger.insert(ledger_id, updated);
        Ok(wallet.balance)
    }

    async fn fail_ledger(&self, ledger_id: Uuid) -> anyhow::Result<()> {
        let mut data = self.data.lock().await;
        let entry = data
            .ledger
            .get_mut(&ledger_id)
            .ok_or_else(|| anyhow::anyhow!("ledger entry not found"))?;
        if entry.status != LedgerStatus::Pending {
            anyhow::bail!("ledger entry {} is not PENDING", ledger_id);
        }
        entry.status = LedgerStatus::Failed;
        Ok(())
    }

    async fn cancel_with_refund(
        &self,
        ledger_id: Uuid,
        terminal_cancelled: bool,
    ) -> anyhow::Result<(Decimal, Uuid)> {
        let mut data = self.data.lock().await;
        let entry = data
            .ledger
            .get(&ledger_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("ledger entry not found"))?;
        if entry.status != LedgerStatus::Pending {
            anyhow::bail!("ledger entry {} is not PENDING", ledger_id);
        }
        let mut updated = entry.clone();
        updated.status = if terminal_cancelled {
            LedgerStatus::Cancelled
        } else {
            LedgerStatus::Failed
        };
        data.ledger.insert(ledger_id, updated);

        let mut wallet = data
            .wallets
            .get(&entry.user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("wallet not found for {}", entry.user_id))?;
        let refund_amount = entry.amount.abs();
        wallet.balance += refund_amount;
        data.wallets.insert(entry.user_id, wallet.clone());

        let refund_id = Uuid::new_v4();
        data.ledger.insert(
            refund_id,
            LedgerEntry {
                id: refund_id,
                user_id: entry.user_id,
                kind: LedgerKind::Refund,
                amount: refund_amount,
                status: LedgerStatus::Completed,
                game_ref: entry.game_ref,
                receipt: None,
                created_at: chrono::Utc::now(),
            },
        );
        Ok((wallet.balance, refund_id))
    }

    async fn get_ledger(&self, ledger_id: Uuid) -> anyhow::Result<Option<LedgerEntry>> {
        Ok(self.data.lock().await.ledger.get(&ledger_id).cloned())
    }

    async fn find_completed_by_receipt(&self, receipt: &str) -> anyhow::Result<Option<LedgerEntry>> {
        let data = self.data.lock().await;
        Ok(data
            .ledger
            .values()
            .find(|e| e.status == LedgerStatus::Completed && e.receipt.as_deref() == Some(receipt))
            .cloned())
    }

    async fn find_settlement(&self, room_id: Uuid) -> anyhow::Result<Option<LedgerEntry>> {
        let data = self.data.lock().await;
        Ok(data
            .ledger
            .values()
            .find(|e| {
                e.status == LedgerStatus::Completed
                    && e.kind == LedgerKind::GameWinning
                    && e.game_ref == Some(room_id)
            })
            .cloned())
    }

    async fn list_ledger_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<LedgerEntry>> {
        let data = self.data.lock().await;
        Ok(data
            .ledger
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn sum_refunds_for_room(&self, room_id: Uuid) -> anyhow::Result<Decimal> {
        let data = self.data.lock().await;
        Ok(data
            .ledger
            .values()
            .filter(|e| {
                e.status == LedgerStatus::Completed
                    && e.kind == LedgerKind::Refund
                    && e.game_ref == Some(room_id)
            })
            .map(|e| e.amount.abs())
            .sum())
    }

    async fn sum_entries_for_room(&self, room_id: Uuid) -> anyhow::Result<Decimal> {
        let data = self.data.lock().await;
        Ok(data
            .ledger
            .values()
            .filter(|e| {
                e.status == LedgerStatus::Completed
                    && e.kind == LedgerKind::GameEntry
                    && e.game_ref == Some(room_id)
            })
            .map(|e| e.amount.abs())
            .sum())
    }

    async fn enqueue(&self, entry: QueueEntry) -> anyhow::Result<()> {
        let mut data = self.data.lock().await;
        data.queue.retain(|_, e| e.user_id != entry.user_id);
        data.queue.insert(entry.id, entry);
        Ok(())
    }

    async fn remove_queue_entry(&self, entry_id: Uuid) -> anyhow::Result<()> {
        self.data.lock().await.queue.remove(&entry_id);
        Ok(())
    }

    async fn remove_queue_entry_for_user(&self, user_id: Uuid) -> anyhow::Result<Option<QueueEntry>> {
        let mut data = self.data.lock().await;
        let found = data.queue.values().find(|e| e.user_id == user_id).cloned();
        if let Some(ref e) = found {
            data.queue.remove(&e.id);
        }
        Ok(found)
    }

    async fn list_queue(&self) -> anyhow::Result<Vec<QueueEntry>> {
        Ok(self.data.lock().await.queue.values().cloned().collect())
    }

    async fn attempt_match(&self, group: MatchGroup) -> anyhow::Result<MatchOutcome> {
        let mut data = self.data.lock().await;

        // Validate every entry is still queued (it may have been removed
        // by a concurrent leave between grouping and this attempt).
        for entry in &group.entries {
            if !data.queue.contains_key(&entry.id) {
                anyhow::bail!("queue entry {} no longer present", entry.id);
            }
        }

        // Debit entry fees against a scratch copy of wallets first so a
        // mid-group failure leaves no balance mutated (spec: "no debits
        // persist" on abort).
        let mut scratch: HashMap<Uuid, Wallet> = HashMap::new();
        for entry in &group.entries {
            if entry.entry_fee <= Decimal::ZERO {
                continue;
            }
            let wallet = scratch
                .entry(entry.user_id)
                .or_insert_with(|| data.wallets.get(&entry.user_id).cloned().unwrap_or(Wallet::new(entry.user_id)));
            if wallet.balance < entry.entry_fee {
                return Ok(MatchOutcome::InsufficientBalance {
                    failed_entry_id: entry.id,
                    failed_user_id: entry.user_id,
                });
            }
            wallet.balance -= entry.entry_fee;
        }

        // Commit: apply scratch balances, write GAME_ENTRY ledger rows,
        // create room + participants, delete matched queue entries.
        for (user_id, wallet) in scratch {
            data.wallets.insert(user_id, wallet);
        }
        for entry in &group.entries {
            if entry.entry_fee <= Decimal::ZERO {
                continue;
            }
            let id = Uuid::new_v4();
            data.ledger.insert(
                id,
                LedgerEntry {
                    id,
                    user_id: entry.user_id,
                    kind: LedgerKind::GameEntry,
                    amount: -entry.entry_fee,
                    status: LedgerStatus::Completed,
                    game_ref: Some(group.room.id),
                    receipt: None,
                    created_at: chrono::Utc::now(),
                },
            );
        }
        for entry in &group.entries {
            data.queue.remove(&entry.id);
        }
        data.rooms.insert(group.room.id, group.room.clone());
        data.participants.insert(group.room.id, group.participants);

        Ok(MatchOutcome::Formed(group.room))
    }

    async fn get_room(&self, room_id: Uuid) -> anyhow::Result<Option<Room>> {
        Ok(self.data.lock().await.rooms.get(&room_id).cloned())
    }

    async fn get_participants(&self, room_id: Uuid) -> anyhow::Result<Vec<Participant>> {
        Ok(self
            .data
            .lock()
            .await
            .participants
            .get(&room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_room_snapshot(&self, room: &Room) -> anyhow::Result<()> {
        self.data.lock().await.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn update_participant_score(&self, room_id: Uuid, user_id: Uuid, score: i64) -> anyhow::Result<()> {
        let mut data = self.data.lock().await;
        if let Some(participants) = data.participants.get_mut(&room_id) {
            if let Some(p) = participants.iter_mut().find(|p| p.user_id == user_id) {
                p.score = score;
            }
        }
        Ok(())
    }

    async fn cancel_room(&self, room_id: Uuid) -> anyhow::Result<()> {
        let mut data = self.data.lock().await;
        if let Some(room) = data.rooms.get_mut(&room_id) {
            room.status = RoomStatus::Cancelled;
        }
        let participants = data.participants.get(&room_id).cloned().unwrap_or_default();
        drop(data);
        for p in participants {
            let data = self.data.lock().await;
            let pending = data
                .ledger
                .values()
                .find(|e| {
                    e.user_id == p.user_id
                        && e.kind == LedgerKind::GameEntry
                        && e.game_ref == Some(room_id)
                        && e.status == LedgerStatus::Completed
                })
                .cloned();
            drop(data);
            if let Some(entry) = pending {
                // Entry fees are recorded COMPLETED immediately (no PENDING
                // phase at matchmaking), so refund directly rather than via
                // cancel_with_refund (which expects a PENDING source row).
                let mut data = self.data.lock().await;
                let already_refunded = data.ledger.values().any(|e| {
                    e.user_id == p.user_id
                        && e.kind == LedgerKind::Refund
                        && e.game_ref == Some(room_id)
                });
                if already_refunded {
                    continue;
                }
                let mut wallet = data.wallets.get(&p.user_id).cloned().unwrap();
                wallet.balance += entry.amount.abs();
                data.wallets.insert(p.user_id, wallet);
                let id = Uuid::new_v4();
                data.ledger.insert(
                    id,
                    LedgerEntry {
                        id,
                        user_id: p.user_id,
                        kind: LedgerKind::Refund,
                        amount: entry.amount.abs(),
                        status: LedgerStatus::Completed,
                        game_ref: Some(room_id),
                        receipt: None,
                        created_at: chrono::Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }
}

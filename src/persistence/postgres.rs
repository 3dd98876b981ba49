//! Postgres-backed [`Store`] (spec §6 conceptual schema, §4.11).
//!
//! Every method that spec §4.1/§4.4 calls "one transaction" opens exactly
//! one `sqlx::Transaction` and commits (or rolls back on early return) —
//! there is no retry inside these methods; spec §7 places write retries
//! out of scope ("writes are not retried within a handler").
//!
//! Schema (conceptual; a real deployment applies these via migrations,
//! omitted here since spec §6 treats the schema as illustrative):
//!
//! ```sql
//! CREATE TYPE ledger_kind AS ENUM ('DEPOSIT','WITHDRAWAL','GAME_ENTRY','GAME_WINNING','REFUND','REFERRAL_BONUS');
//! CREATE TYPE ledger_status AS ENUM ('PENDING','COMPLETED','FAILED','CANCELLED');
//! CREATE TYPE game_type AS ENUM ('CLASSIC_LUDO','FAST_LUDO','MEMORY','SNAKES_LADDERS');
//! CREATE TYPE room_status AS ENUM ('WAITING','PLAYING','FINISHED','CANCELLED');
//!
//! CREATE TABLE users (id uuid PRIMARY KEY, phone text UNIQUE NOT NULL, display_name text NOT NULL, verified bool NOT NULL, created_at timestamptz NOT NULL);
//! CREATE TABLE wallets (user_id uuid PRIMARY KEY REFERENCES users(id), balance numeric(10,2) NOT NULL);
//! CREATE TABLE ledger (id uuid PRIMARY KEY, user_id uuid NOT NULL, kind ledger_kind NOT NULL, amount numeric(10,2) NOT NULL, status ledger_status NOT NULL, game_id uuid, receipt text, created_at timestamptz NOT NULL);
//! CREATE UNIQUE INDEX ledger_receipt_uq ON ledger (receipt) WHERE receipt IS NOT NULL;
//! CREATE TABLE rooms (id uuid PRIMARY KEY, type game_type NOT NULL, max_players smallint NOT NULL, entry_fee numeric(10,2) NOT NULL, prize_pool numeric(10,2) NOT NULL, status room_status NOT NULL, engine_state jsonb NOT NULL, current_turn smallint NOT NULL, winner uuid, created_at timestamptz NOT NULL, started_at timestamptz, finished_at timestamptz);
//! CREATE TABLE participants (room_id uuid NOT NULL, user_id uuid NOT NULL, seat smallint NOT NULL, color text, score bigint NOT NULL, PRIMARY KEY (room_id, user_id), UNIQUE (room_id, seat));
//! CREATE TABLE queue (id uuid PRIMARY KEY, user_id uuid UNIQUE NOT NULL, type game_type NOT NULL, max_players smallint NOT NULL, entry_fee numeric(10,2) NOT NULL, enqueued_at timestamptz NOT NULL);
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{LedgerEntry, LedgerKind, LedgerStatus, Participant, QueueEntry, Room, RoomStatus, User, Wallet};

use super::{MatchGroup, MatchOutcome, Store};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Ok(PostgresStore { pool })
    }

    async fn apply_signed_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
    ) -> anyhow::Result<Decimal> {
        let signed = if kind.is_credit() { amount } else { -amount };
        let row: (Decimal,) = sqlx::query_as(
            "UPDATE wallets SET balance = balance + $1 WHERE user_id = $2 RETURNING balance",
        )
        .bind(signed)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
        if row.0 < Decimal::ZERO {
            anyhow::bail!("balance would go negative for user {}", user_id);
        }
        Ok(row.0)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_user(&self, display_name: &str, phone: &str) -> anyhow::Result<User> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO users (id, phone, display_name, verified, created_at) VALUES ($1, $2, $3, true, $4)",
        )
        .bind(id)
        .bind(phone)
        .bind(display_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO wallets (user_id, balance) VALUES ($1, 0)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(User {
            id,
            display_name: display_name.to_string(),
            phone: phone.to_string(),
            verified: true,
            created_at: now,
        })
    }

    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, (Uuid, String, String, bool, chrono::DateTime<chrono::Utc>)>(
            "SELECT id, phone, display_name, verified, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, phone, display_name, verified, created_at)| User {
            id,
            display_name,
            phone,
            verified,
            created_at,
        }))
    }

    async fn get_wallet(&self, user_id: Uuid) -> anyhow::Result<Wallet> {
        let (balance,): (Decimal,) =
            sqlx::query_as("SELECT balance FROM wallets WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(Wallet { user_id, balance })
    }

    async fn insert_pending_ledger(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
        receipt: Option<String>,
    ) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO ledger (id, user_id, kind, amount, status, game_id, receipt, created_at)
             VALUES ($1, $2, $3, $4, 'PENDING', $5, $6, now())",
        )
        .bind(id)
        .bind(user_id)
        .bind(kind)
        .bind(amount)
        .bind(game_ref)
        .bind(receipt)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn direct_mutate(
        &self,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        game_ref: Option<Uuid>,
    ) -> anyhow::Result<(Decimal, Uuid)> {
        if amount <= Decimal::ZERO {
            anyhow::bail!("amount must be positive");
        }
        let mut tx = self.pool.begin().await?;
        let balance = Self::apply_signed_tx(&mut tx, user_id, kind, amount).await?;
        let id = Uuid::new_v4();
        let signed = if kind.is_credit() { amount } else { -amount };
        sqlx::query(
            "INSERT INTO ledger (id, user_id, kind, amount, status, game_id, receipt, created_at)
             VALUES ($1, $2, $3, $4, 'COMPLETED', $5, NULL, now())",
        )
        .bind(id)
        .bind(user_id)
        .bind(kind)
        .bind(signed)
        .bind(game_ref)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok((balance, id))
    }

    async fn complete_ledger(&self, ledger_id: Uuid, receipt: Option<&str>) -> anyhow::Result<Decimal> {
        let mut tx = self.pool.begin().await?;
        let row: (Uuid, String, Decimal, String) = sqlx::query_as(
            "SELECT user_id, kind::text, amount, status::text FROM ledger WHERE id = $1 FOR UPDATE",
        )
        .bind(ledger_id)
        .fetch_one(&mut *tx)
        .await?;
        let (user_id, kind_text, amount, status_text) = row;
        if status_text != "PENDING" {
            anyhow::bail!("ledger entry {} is not PENDING", ledger_id);
        }
        let kind = kind_from_text(&kind_text)?;
        let balance = Self::apply_signed_tx(&mut tx, user_id, kind, amount.abs()).await?;
        let signed = if kind.is_credit() { amount.abs() } else { -amount.abs() };
        // `ledger_receipt_uq` enforces "no two COMPLETED entries share a
        // receipt" at the database level; a duplicate here surfaces as a
        // constraint violation rather than a silent overwrite.
        sqlx::query("UPDATE ledger SET status = 'COMPLETED', amount = $1, receipt = COALESCE($2, receipt) WHERE id = $3")
            .bind(signed)
            .bind(receipt)
            .bind(ledger_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn fail_ledger(&self, ledger_id: Uuid) -> anyhow::Result<()> {
        let result = sqlx::query("UPDATE ledger SET status = 'FAILED' WHERE id = $1 AND status = 'PENDING'")
            .bind(ledger_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("ledger entry {} is not PENDING", ledger_id);
        }
        Ok(())
    }

    async fn cancel_with_refund(
        &self,
        ledger_id: Uuid,
        terminal_cancelled: bool,
    ) -> anyhow::Result<(Decimal, Uuid)> {
        let mut tx = self.pool.begin().await?;
        let row: (Uuid, Decimal, String, Option<Uuid>) = sqlx::query_as(
            "SELECT user_id, amount, status::text, game_id FROM ledger WHERE id = $1 FOR UPDATE",
        )
        .bind(ledger_id)
        .fetch_one(&mut *tx)
        .await?;
        let (user_id, amount, status_text, game_id) = row;
        if status_text != "PENDING" {
            anyhow::bail!("ledger entry {} is not PENDING", ledger_id);
        }
        let new_status = if terminal_cancelled { "CANCELLED" } else { "FAILED" };
        sqlx::query("UPDATE ledger SET status = $1 WHERE id = $2")
            .bind(new_status)
            .bind(ledger_id)
            .execute(&mut *tx)
            .await?;

        let refund_amount = amount.abs();
        let balance = Self::apply_signed_tx(&mut tx, user_id, LedgerKind::Refund, refund_amount).await?;
        let refund_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO ledger (id, user_id, kind, amount, status, game_id, receipt, created_at)
             VALUES ($1, $2, 'REFUND', $3, 'COMPLETED', $4, NULL, now())",
        )
        .bind(refund_id)
        .bind(user_id)
        .bind(refund_amount)
        .bind(game_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok((balance, refund_id))
    }

    async fn get_ledger(&self, ledger_id: Uuid) -> anyhow::Result<Option<LedgerEntry>> {
        fetch_ledger_optional(&self.pool, "id = $1", ledger_id).await
    }

    async fn find_completed_by_receipt(&self, receipt: &str) -> anyhow::Result<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(
            "SELECT id, user_id, kind::text, amount, status::text, game_id, receipt, created_at
             FROM ledger WHERE status = 'COMPLETED' AND receipt = $1",
        )
        .bind(receipt)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_settlement(&self, room_id: Uuid) -> anyhow::Result<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(
            "SELECT id, user_id, kind::text, amount, status::text, game_id, receipt, created_at
             FROM ledger WHERE status = 'COMPLETED' AND kind = 'GAME_WINNING' AND game_id = $1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_ledger_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            "SELECT id, user_id, kind::text, amount, status::text, game_id, receipt, created_at
             FROM ledger WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn sum_refunds_for_room(&self, room_id: Uuid) -> anyhow::Result<Decimal> {
        let (sum,): (Option<Decimal>,) = sqlx::query_as(
            "SELECT SUM(ABS(amount)) FROM ledger WHERE status = 'COMPLETED' AND kind = 'REFUND' AND game_id = $1",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum.unwrap_or(Decimal::ZERO))
    }

    async fn sum_entries_for_room(&self, room_id: Uuid) -> anyhow::Result<Decimal> {
        let (sum,): (Option<Decimal>,) = sqlx::query_as(
            "SELECT SUM(ABS(amount)) FROM ledger WHERE status = 'COMPLETED' AND kind = 'GAME_ENTRY' AND game_id = $1",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum.unwrap_or(Decimal::ZERO))
    }

    async fn enqueue(&self, entry: QueueEntry) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM queue WHERE user_id = $1")
            .bind(entry.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO queue (id, user_id, type, max_players, entry_fee, enqueued_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.game_type)
        .bind(entry.max_players as i16)
        .bind(entry.entry_fee)
        .bind(entry.enqueued_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_queue_entry(&self, entry_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM queue WHERE id = $1")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_queue_entry_for_user(&self, user_id: Uuid) -> anyhow::Result<Option<QueueEntry>> {
        let row = sqlx::query_as::<_, QueueRow>(
            "DELETE FROM queue WHERE user_id = $1
             RETURNING id, user_id, type::text, max_players, entry_fee, enqueued_at",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_queue(&self) -> anyhow::Result<Vec<QueueEntry>> {
        let rows = sqlx::query_as::<_, QueueRow>(
            "SELECT id, user_id, type::text, max_players, entry_fee, enqueued_at
             FROM queue ORDER BY enqueued_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn attempt_match(&self, group: MatchGroup) -> anyhow::Result<MatchOutcome> {
        let mut tx = self.pool.begin().await?;

        for entry in &group.entries {
            if entry.entry_fee <= Decimal::ZERO {
                continue;
            }
            let row: Option<(Decimal,)> =
                sqlx::query_as("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
                    .bind(entry.user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let balance = match row {
                Some((b,)) => b,
                None => Decimal::ZERO,
            };
            if balance < entry.entry_fee {
                // Rolling back by dropping `tx`; no partial debit persists.
                return Ok(MatchOutcome::InsufficientBalance {
                    failed_entry_id: entry.id,
                    failed_user_id: entry.user_id,
                });
            }
        }

        for entry in &group.entries {
            if entry.entry_fee <= Decimal::ZERO {
                continue;
            }
            Self::apply_signed_tx(&mut tx, entry.user_id, LedgerKind::GameEntry, entry.entry_fee).await?;
            let id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO ledger (id, user_id, kind, amount, status, game_id, receipt, created_at)
                 VALUES ($1, $2, 'GAME_ENTRY', $3, 'COMPLETED', $4, NULL, now())",
            )
            .bind(id)
            .bind(entry.user_id)
            .bind(-entry.entry_fee)
            .bind(group.room.id)
            .execute(&mut *tx)
            .await?;
        }

        let room = &group.room;
        sqlx::query(
            "INSERT INTO rooms (id, type, max_players, entry_fee, prize_pool, status, engine_state, current_turn, winner, created_at, started_at, finished_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(room.id)
        .bind(room.game_type)
        .bind(room.max_players as i16)
        .bind(room.entry_fee)
        .bind(room.prize_pool)
        .bind(room.status)
        .bind(sqlx::types::Json(&room.engine_state))
        .bind(room.current_turn_index as i16)
        .bind(room.winner)
        .bind(room.created_at)
        .bind(room.started_at)
        .bind(room.finished_at)
        .execute(&mut *tx)
        .await?;

        for p in &group.participants {
            sqlx::query(
                "INSERT INTO participants (room_id, user_id, seat, color, score) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(p.room_id)
            .bind(p.user_id)
            .bind(p.seat as i16)
            .bind(&p.color)
            .bind(p.score)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &group.entries {
            sqlx::query("DELETE FROM queue WHERE id = $1")
                .bind(entry.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(MatchOutcome::Formed(group.room))
    }

    async fn get_room(&self, room_id: Uuid) -> anyhow::Result<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, type::text, max_players, entry_fee, prize_pool, status::text, engine_state, current_turn, winner, created_at, started_at, finished_at
             FROM rooms WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_participants(&self, room_id: Uuid) -> anyhow::Result<Vec<Participant>> {
        let rows: Vec<(Uuid, Uuid, i16, Option<String>, i64)> = sqlx::query_as(
            "SELECT room_id, user_id, seat, color, score FROM participants WHERE room_id = $1 ORDER BY seat ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(room_id, user_id, seat, color, score)| Participant {
                user_id,
                room_id,
                seat: seat as u8,
                color,
                score,
            })
            .collect())
    }

    async fn save_room_snapshot(&self, room: &Room) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE rooms SET status = $1, engine_state = $2, current_turn = $3, winner = $4, started_at = $5, finished_at = $6
             WHERE id = $7",
        )
        .bind(room.status)
        .bind(sqlx::types::Json(&room.engine_state))
        .bind(room.current_turn_index as i16)
        .bind(room.winner)
        .bind(room.started_at)
        .bind(room.finished_at)
        .bind(room.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_participant_score(&self, room_id: Uuid, user_id: Uuid, score: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE participants SET score = $1 WHERE room_id = $2 AND user_id = $3")
            .bind(score)
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn cancel_room(&self, room_id: Uuid) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE rooms SET status = 'CANCELLED' WHERE id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        let debits: Vec<(Uuid, Decimal)> = sqlx::query_as(
            "SELECT user_id, amount FROM ledger WHERE game_id = $1 AND kind = 'GAME_ENTRY' AND status = 'COMPLETED'",
        )
        .bind(room_id)
        .fetch_all(&mut *tx)
        .await?;
        for (user_id, amount) in debits {
            let already: Option<(Uuid,)> = sqlx::query_as(
                "SELECT id FROM ledger WHERE user_id = $1 AND game_id = $2 AND kind = 'REFUND'",
            )
            .bind(user_id)
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await?;
            if already.is_some() {
                continue;
            }
            let refund_amount = amount.abs();
            Self::apply_signed_tx(&mut tx, user_id, LedgerKind::Refund, refund_amount).await?;
            sqlx::query(
                "INSERT INTO ledger (id, user_id, kind, amount, status, game_id, receipt, created_at)
                 VALUES ($1, $2, 'REFUND', $3, 'COMPLETED', $4, NULL, now())",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(refund_amount)
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn kind_from_text(s: &str) -> anyhow::Result<LedgerKind> {
    Ok(match s {
        "DEPOSIT" => LedgerKind::Deposit,
        "WITHDRAWAL" => LedgerKind::Withdrawal,
        "GAME_ENTRY" => LedgerKind::GameEntry,
        "GAME_WINNING" => LedgerKind::GameWinning,
        "REFUND" => LedgerKind::Refund,
        "REFERRAL_BONUS" => LedgerKind::ReferralBonus,
        other => anyhow::bail!("unknown ledger kind {}", other),
    })
}

fn status_from_text(s: &str) -> anyhow::Result<LedgerStatus> {
    Ok(match s {
        "PENDING" => LedgerStatus::Pending,
        "COMPLETED" => LedgerStatus::Completed,
        "FAILED" => LedgerStatus::Failed,
        "CANCELLED" => LedgerStatus::Cancelled,
        other => anyhow::bail!("unknown ledger status {}", other),
    })
}

fn game_type_from_text(s: &str) -> anyhow::Result<crate::models::GameType> {
    use crate::models::GameType;
    Ok(match s {
        "CLASSIC_LUDO" => GameType::ClassicLudo,
        "FAST_LUDO" => GameType::FastLudo,
        "MEMORY" => GameType::Memory,
        "SNAKES_LADDERS" => GameType::SnakesLadders,
        other => anyhow::bail!("unknown game type {}", other),
    })
}

fn room_status_from_text(s: &str) -> anyhow::Result<RoomStatus> {
    Ok(match s {
        "WAITING" => RoomStatus::Waiting,
        "PLAYING" => RoomStatus::Playing,
        "FINISHED" => RoomStatus::Finished,
        "CANCELLED" => RoomStatus::Cancelled,
        other => anyhow::bail!("unknown room status {}", other),
    })
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    amount: Decimal,
    status: String,
    game_id: Option<Uuid>,
    receipt: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        LedgerEntry {
            id: row.id,
            user_id: row.user_id,
            kind: kind_from_text(&row.kind).unwrap_or(LedgerKind::Deposit),
            amount: row.amount,
            status: status_from_text(&row.status).unwrap_or(LedgerStatus::Failed),
            game_ref: row.game_id,
            receipt: row.receipt,
            created_at: row.created_at,
        }
    }
}

async fn fetch_ledger_optional(
    pool: &PgPool,
    predicate: &str,
    id: Uuid,
) -> anyhow::Result<Option<LedgerEntry>> {
    let query = format!(
        "SELECT id, user_id, kind::text, amount, status::text, game_id, receipt, created_at FROM ledger WHERE {}",
        predicate
    );
    let row = sqlx::query_as::<_, LedgerRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Into::into))
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: Uuid,
    user_id: Uuid,
    r#type: String,
    max_players: i16,
    entry_fee: Decimal,
    enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = anyhow::Error;
    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        Ok(QueueEntry {
            id: row.id,
            user_id: row.user_id,
            game_type: game_type_from_text(&row.r#type)?,
            max_players: row.max_players as u8,
            entry_fee: row.entry_fee,
            enqueued_at: row.enqueued_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    r#type: String,
    max_players: i16,
    entry_fee: Decimal,
    prize_pool: Decimal,
    status: String,
    engine_state: sqlx::types::Json<serde_json::Value>,
    current_turn: i16,
    winner: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<RoomRow> for Room {
    type Error = anyhow::Error;
    fn try_from(row: RoomRow) -> Result<Self, Self::Error> {
        Ok(Room {
            id: row.id,
            game_type: game_type_from_text(&row.r#type)?,
            max_players: row.max_players as u8,
            entry_fee: row.entry_fee,
            prize_pool: row.prize_pool,
            status: room_status_from_text(&row.status)?,
            engine_state: row.engine_state.0,
            current_turn_index: row.current_turn as usize,
            winner: row.winner,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

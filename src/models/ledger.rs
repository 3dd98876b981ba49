//! Append-only ledger entries (spec §3, §4.1).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerKind {
    Deposit,
    Withdrawal,
    GameEntry,
    GameWinning,
    Refund,
    ReferralBonus,
}

impl LedgerKind {
    /// Whether this kind's amount is recorded (and summed) as positive.
    pub fn is_credit(self) -> bool {
        matches!(
            self,
            LedgerKind::Deposit | LedgerKind::GameWinning | LedgerKind::Refund | LedgerKind::ReferralBonus
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: LedgerKind,
    /// Signed by kind: deposit/winning/refund positive, withdrawal/entry negative.
    pub amount: Decimal,
    pub status: LedgerStatus,
    pub game_ref: Option<Uuid>,
    pub receipt: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

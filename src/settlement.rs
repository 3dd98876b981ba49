//! Settlement (spec §4.10, C10): crediting the winner's prize pool
//! exactly once per room.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppResult;
use crate::wallet::WalletLedger;

pub struct Settlement {
    ledger: Arc<WalletLedger>,
}

impl Settlement {
    pub fn new(ledger: Arc<WalletLedger>) -> Self {
        Settlement { ledger }
    }

    /// Credits `winner` the room's prize pool, guarded by
    /// `WalletLedger::settle_winner`'s idempotency check (spec testable
    /// property 10: "calling settle on the same room twice produces the
    /// same ledger state").
    pub async fn settle(&self, room_id: Uuid, winner: Uuid, prize_pool: rust_decimal::Decimal) -> AppResult<()> {
        self.ledger.settle_winner(room_id, winner, prize_pool).await?;
        Ok(())
    }
}

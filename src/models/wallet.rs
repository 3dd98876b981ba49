//! Wallet (spec §3): one-to-one with a user, balance never negative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: Decimal,
}

impl Wallet {
    pub fn new(user_id: Uuid) -> Self {
        Wallet {
            user_id,
            balance: Decimal::ZERO,
        }
    }
}

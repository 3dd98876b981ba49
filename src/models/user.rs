//! User identity (spec §3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform user. Created on first successful OTP verification
/// (verification itself is out of scope — spec §1); never destroyed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub phone: String,
    pub verified: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

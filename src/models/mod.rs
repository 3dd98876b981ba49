//! Domain entities (spec §3).
//!
//! These types are the type-safe contract between the session bus, the
//! engines, and the persistence layer — mirroring how the teacher's
//! `models/mod.rs` mirrors on-chain account schemas as plain Rust structs.

pub mod ledger;
pub mod queue;
pub mod room;
pub mod user;
pub mod wallet;

pub use ledger::{LedgerEntry, LedgerKind, LedgerStatus};
pub use queue::QueueEntry;
pub use room::{GameType, Participant, Room, RoomStatus};
pub use user::User;
pub use wallet::Wallet;

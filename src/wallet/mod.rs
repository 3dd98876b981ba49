//! Wallet Ledger (spec §4.1, C1).
//!
//! The domain layer over [`crate::persistence::Store`]: validates amounts
//! and signatures, then delegates each mutation to one atomic storage
//! call. Mirrors how the teacher's `services::SolanaService` sits between
//! handlers and the RPC client — here the "external system" is the
//! durable store plus the payment gateway's HMAC check.

pub mod gateway;
pub mod ledger;

pub use gateway::verify_gateway_signature;
pub use ledger::WalletLedger;

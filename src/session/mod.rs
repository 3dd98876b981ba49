//! Session Bus (spec §4.3, §5, C3).
//!
//! Authenticated inbound event dispatch and addressed outbound fan-out,
//! built the way the teacher's `handlers/ws.rs` scaffolds a WebSocket
//! handler — except this one actually routes: inbound events reach the
//! matchmaker queue or a room actor's inbox, and outbound events are
//! delivered in FIFO order per recipient connection via a dedicated
//! `mpsc` channel instead of the teacher's echo-only loop.

pub mod auth;
pub mod bus;
pub mod events;
pub mod ws;

pub use auth::AuthProvider;
pub use bus::SessionBus;
pub use events::{InboundEvent, OutboundEvent};

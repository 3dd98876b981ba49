//! Addressed outbound fan-out + per-connection delivery ordering
//! (spec §4.3, §5).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::registry::ConnectionRegistry;

use super::events::OutboundEvent;

type Sender = mpsc::UnboundedSender<OutboundEvent>;

/// Fans events out to connections, users, and rooms. Delivery to a given
/// connection preserves emission order (spec §4.3: "delivered in the
/// order emitted per recipient connection"); no ordering is promised
/// across connections.
pub struct SessionBus {
    registry: Arc<ConnectionRegistry>,
    senders: std::sync::RwLock<HashMap<Uuid, Sender>>,
}

impl SessionBus {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        SessionBus {
            registry,
            senders: std::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Registers the outbound channel for a freshly-opened connection.
    pub fn register_connection(&self, connection: Uuid, sender: Sender) {
        self.senders.write().unwrap().insert(connection, sender);
    }

    pub fn remove_connection(&self, connection: Uuid) {
        self.senders.write().unwrap().remove(&connection);
    }

    pub fn send_to_connection(&self, connection: Uuid, event: OutboundEvent) {
        let senders = self.senders.read().unwrap();
        if let Some(tx) = senders.get(&connection) {
            // A closed receiver means the socket task already exited;
            // nothing to roll back (spec §5: persistent side effects are
            // retained even if the emit itself is dropped).
            let _ = tx.send(event);
        }
    }

    pub fn send_to_user(&self, user: Uuid, event: OutboundEvent) {
        for connection in self.registry.sockets_of_user(user) {
            self.send_to_connection(connection, event.clone());
        }
    }

    pub fn send_to_room(&self, room: Uuid, event: OutboundEvent) {
        for user in self.registry.users_in_room(room) {
            self.send_to_user(user, event.clone());
        }
    }
}

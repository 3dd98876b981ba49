//! Connection Registry (spec §4.2, §5, C2).
//!
//! Four bidirectional maps behind one `std::sync::RwLock`, as spec §5
//! prescribes ("a single reader/writer lock protecting four maps;
//! operations are O(1)") rather than four independently-locked maps
//! (which would invite torn reads between e.g. `user -> connections` and
//! `connection -> user`).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use uuid::Uuid;

#[derive(Default)]
struct RegistryState {
    conn_to_user: HashMap<Uuid, Uuid>,
    user_to_conns: HashMap<Uuid, HashSet<Uuid>>,
    user_to_rooms: HashMap<Uuid, HashSet<Uuid>>,
    room_to_users: HashMap<Uuid, HashSet<Uuid>>,
}

/// Process-scoped service owning connection/user/room membership. Created
/// once at startup and shared via `Arc` (spec §9: "own them as
/// process-scoped services with explicit init and shutdown").
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn attach(&self, connection: Uuid, user: Uuid) {
        let mut state = self.state.write().unwrap();
        state.conn_to_user.insert(connection, user);
        state.user_to_conns.entry(user).or_default().insert(connection);
    }

    /// Detaches a connection. Returns `true` if this was the user's last
    /// connection (caller should then call [`leave_all_rooms`] — spec
    /// §4.2: "Detach of the last connection of a user triggers
    /// leaveAllRooms(user)").
    ///
    /// [`leave_all_rooms`]: ConnectionRegistry::leave_all_rooms
    pub fn detach(&self, connection: Uuid) -> Option<(Uuid, bool)> {
        let mut state = self.state.write().unwrap();
        let user = state.conn_to_user.remove(&connection)?;
        let mut was_last = false;
        if let Some(conns) = state.user_to_conns.get_mut(&user) {
            conns.remove(&connection);
            was_last = conns.is_empty();
            if was_last {
                state.user_to_conns.remove(&user);
            }
        }
        Some((user, was_last))
    }

    pub fn sockets_of_user(&self, user: Uuid) -> HashSet<Uuid> {
        self.state
            .read()
            .unwrap()
            .user_to_conns
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    pub fn user_of_socket(&self, connection: Uuid) -> Option<Uuid> {
        self.state.read().unwrap().conn_to_user.get(&connection).copied()
    }

    pub fn is_user_online(&self, user: Uuid) -> bool {
        self.state
            .read()
            .unwrap()
            .user_to_conns
            .get(&user)
            .map(|c| !c.is_empty())
            .unwrap_or(false)
    }

    pub fn join_room(&self, user: Uuid, room: Uuid) {
        let mut state = self.state.write().unwrap();
        state.user_to_rooms.entry(user).or_default().insert(room);
        state.room_to_users.entry(room).or_default().insert(user);
    }

    pub fn leave_room(&self, user: Uuid, room: Uuid) {
        let mut state = self.state.write().unwrap();
        if let Some(rooms) = state.user_to_rooms.get_mut(&user) {
            rooms.remove(&room);
        }
        if let Some(users) = state.room_to_users.get_mut(&room) {
            users.remove(&user);
            if users.is_empty() {
                state.room_to_users.remove(&room);
            }
        }
    }

    pub fn leave_all_rooms(&self, user: Uuid) {
        let mut state = self.state.write().unwrap();
        if let Some(rooms) = state.user_to_rooms.remove(&user) {
            for room in rooms {
                if let Some(users) = state.room_to_users.get_mut(&room) {
                    users.remove(&user);
                    if users.is_empty() {
                        state.room_to_users.remove(&room);
                    }
                }
            }
        }
    }

    pub fn users_in_room(&self, room: Uuid) -> HashSet<Uuid> {
        self.state
            .read()
            .unwrap()
            .room_to_users
            .get(&room)
            .cloned()
            .unwrap_or_default()
    }

    pub fn rooms_of_user(&self, user: Uuid) -> HashSet<Uuid> {
        self.state
            .read()
            .unwrap()
            .user_to_rooms
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes entries whose reverse index is stale — e.g. a
    /// `user_to_conns` set left empty after piecemeal removals. Runs on a
    /// fixed schedule (spec §4.2).
    pub fn cleanup(&self) {
        let mut state = self.state.write().unwrap();
        state.user_to_conns.retain(|_, conns| !conns.is_empty());
        state.user_to_rooms.retain(|_, rooms| !rooms.is_empty());
        state.room_to_users.retain(|_, users| !users.is_empty());
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_device_user_stays_online_until_last_detach() {
        let reg = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        reg.attach(c1, user);
        reg.attach(c2, user);
        assert!(reg.is_user_online(user));

        let (u, was_last) = reg.detach(c1).unwrap();
        assert_eq!(u, user);
        assert!(!was_last);
        assert!(reg.is_user_online(user));

        let (_, was_last) = reg.detach(c2).unwrap();
        assert!(was_last);
        assert!(!reg.is_user_online(user));
    }

    #[test]
    fn room_empty_iff_user_set_empty() {
        let reg = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        reg.join_room(user, room);
        assert_eq!(reg.users_in_room(room).len(), 1);
        reg.leave_room(user, room);
        assert!(reg.users_in_room(room).is_empty());
    }

    #[test]
    fn leave_all_rooms_clears_reverse_index() {
        let reg = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let r1 = Uuid::new_v4();
        let r2 = Uuid::new_v4();
        reg.join_room(user, r1);
        reg.join_room(user, r2);
        reg.leave_all_rooms(user);
        assert!(reg.rooms_of_user(user).is_empty());
        assert!(reg.users_in_room(r1).is_empty());
        assert!(reg.users_in_room(r2).is_empty());
    }
}

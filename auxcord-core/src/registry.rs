use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::events::{DomainEvent, RoomId, UserId};

/// Capacity of each connection's outbound frame queue. A member whose queue
/// is full has frames dropped rather than stalling the room's broadcast.
pub const OUTBOUND_BUFFER: usize = 64;

/// Sending half of a live connection's outbound frame queue.
pub type FrameSender = mpsc::Sender<String>;

/// The in-memory map of live duplex connections, grouped by room.
///
/// The registry is the only holder of connection state. Nothing here is
/// persisted and nothing survives a restart; a reconnecting client performs a
/// fresh join. The membership map sits behind a single readers/writer lock,
/// held only to mutate or snapshot a recipient list, never across a send.
#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: RwLock<HashMap<RoomId, HashMap<UserId, FrameSender>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a live connection, announcing it to the room's other current
    /// members. The joiner never receives its own notice. A second join under
    /// the same user id supersedes the first, closing its outbound queue.
    pub fn join(&self, room_id: RoomId, user_id: UserId, sender: FrameSender) {
        let others: Vec<_> = {
            let mut rooms = self.rooms.write();
            let members = rooms.entry(room_id).or_default();

            members.insert(user_id, sender);
            members
                .iter()
                .filter(|(id, _)| **id != user_id)
                .map(|(id, sender)| (*id, sender.clone()))
                .collect()
        };

        log::debug!("User {} joined room {}", user_id, room_id);

        let notice = DomainEvent::UserJoined {
            room_id,
            user_id,
            timestamp: Utc::now(),
        };

        deliver(&others, &notice);
    }

    /// Remove a connection, closing its outbound queue and announcing the
    /// departure to the remaining members. Removing the last member deletes
    /// the room's entry entirely. Unknown connections are a no-op, as is a
    /// leave from a connection that has already been superseded.
    pub fn leave(&self, room_id: RoomId, user_id: UserId, sender: &FrameSender) {
        let remaining: Vec<_> = {
            let mut rooms = self.rooms.write();

            let Some(members) = rooms.get_mut(&room_id) else {
                return;
            };

            // The registered queue must still be this connection's own,
            // otherwise the leave would remove its replacement
            let is_current = members
                .get(&user_id)
                .map_or(false, |current| current.same_channel(sender));

            if !is_current {
                return;
            }

            members.remove(&user_id);

            if members.is_empty() {
                rooms.remove(&room_id);
                Vec::new()
            } else {
                members
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect()
            }
        };

        log::debug!("User {} left room {}", user_id, room_id);

        let notice = DomainEvent::UserLeft {
            room_id,
            user_id,
            timestamp: Utc::now(),
        };

        deliver(&remaining, &notice);
    }

    /// Fan an event out to every current member of its room, returning how
    /// many members accepted the frame. Rooms with no live members drop the
    /// event entirely.
    pub fn broadcast(&self, event: &DomainEvent) -> usize {
        let recipients: Vec<_> = {
            let rooms = self.rooms.read();

            match rooms.get(&event.room_id()) {
                Some(members) => members
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect(),
                None => return 0,
            }
        };

        deliver(&recipients, event)
    }

    /// Number of live connections in a room.
    pub fn member_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .read()
            .get(&room_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    pub fn is_member(&self, room_id: RoomId, user_id: UserId) -> bool {
        self.rooms
            .read()
            .get(&room_id)
            .map(|members| members.contains_key(&user_id))
            .unwrap_or(false)
    }

    /// Number of rooms with at least one live connection.
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}

/// Serialize an event once and push it into each recipient's queue without
/// blocking. Full or closed queues are logged and skipped; partial delivery
/// is accepted and never retried.
fn deliver(recipients: &[(UserId, FrameSender)], event: &DomainEvent) -> usize {
    if recipients.is_empty() {
        return 0;
    }

    let frame = match serde_json::to_string(event) {
        Ok(frame) => frame,
        Err(err) => {
            log::error!("Failed to serialize outbound frame: {}", err);
            return 0;
        }
    };

    let mut accepted = 0;

    for (user_id, sender) in recipients {
        match sender.try_send(frame.clone()) {
            Ok(_) => accepted += 1,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Outbound queue for user {} is full, dropping frame", user_id)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("Outbound queue for user {} is closed, dropping frame", user_id)
            }
        }
    }

    accepted
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    fn frame_channel() -> (FrameSender, mpsc::Receiver<String>) {
        mpsc::channel(OUTBOUND_BUFFER)
    }

    fn decode(frame: String) -> DomainEvent {
        serde_json::from_str(&frame).expect("valid frame")
    }

    fn song_started(room_id: RoomId) -> DomainEvent {
        DomainEvent::SongStarted {
            room_id,
            user_id: Uuid::new_v4(),
            track_id: "track".to_string(),
            track_name: "Track".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn join_then_leave_removes_the_room_entirely() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        let (sender, _receiver) = frame_channel();
        registry.join(room, user, sender.clone());
        assert_eq!(registry.member_count(room), 1);

        registry.leave(room, user, &sender);
        assert_eq!(registry.member_count(room), 0);
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn joiner_never_receives_its_own_notice() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();

        let (sender, mut receiver) = frame_channel();
        registry.join(room, Uuid::new_v4(), sender);

        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_notifies_existing_members_only() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let (first_sender, mut first_receiver) = frame_channel();
        let (second_sender, mut second_receiver) = frame_channel();

        registry.join(room, first, first_sender);
        registry.join(room, second, second_sender);

        match decode(first_receiver.try_recv().unwrap()) {
            DomainEvent::UserJoined { user_id, .. } => assert_eq!(user_id, second),
            other => panic!("unexpected frame {:?}", other),
        }

        assert!(second_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_notifies_remaining_members_exactly_once() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let leaver = Uuid::new_v4();
        let stayer = Uuid::new_v4();

        let (leaver_sender, _leaver_receiver) = frame_channel();
        let (stayer_sender, mut stayer_receiver) = frame_channel();

        registry.join(room, stayer, stayer_sender);
        registry.join(room, leaver, leaver_sender.clone());

        // Drain the join notice before the interesting part
        stayer_receiver.try_recv().unwrap();

        registry.leave(room, leaver, &leaver_sender);
        assert_eq!(registry.member_count(room), 1);

        match decode(stayer_receiver.try_recv().unwrap()) {
            DomainEvent::UserLeft { user_id, .. } => assert_eq!(user_id, leaver),
            other => panic!("unexpected frame {:?}", other),
        }

        assert!(stayer_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_stays_inside_the_room() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let other_room = Uuid::new_v4();

        let (member_sender, mut member_receiver) = frame_channel();
        let (outsider_sender, mut outsider_receiver) = frame_channel();

        registry.join(room, Uuid::new_v4(), member_sender);
        registry.join(other_room, Uuid::new_v4(), outsider_sender);

        let delivered = registry.broadcast(&song_started(room));

        assert_eq!(delivered, 1);
        assert!(matches!(
            decode(member_receiver.try_recv().unwrap()),
            DomainEvent::SongStarted { .. }
        ));
        assert!(outsider_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_an_empty_room_is_dropped() {
        let registry = ConnectionRegistry::new();

        let delivered = registry.broadcast(&song_started(Uuid::new_v4()));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn full_outbound_queues_drop_frames_without_stalling() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();

        let (slow_sender, mut slow_receiver) = mpsc::channel(1);
        let (healthy_sender, mut healthy_receiver) = frame_channel();

        registry.join(room, Uuid::new_v4(), slow_sender.clone());

        // The second join's notice occupies the slow member's only slot
        registry.join(room, Uuid::new_v4(), healthy_sender);

        let delivered = registry.broadcast(&song_started(room));

        assert_eq!(delivered, 1);
        assert!(matches!(
            decode(healthy_receiver.try_recv().unwrap()),
            DomainEvent::SongStarted { .. }
        ));
        assert!(matches!(
            decode(slow_receiver.try_recv().unwrap()),
            DomainEvent::UserJoined { .. }
        ));
        assert!(slow_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejoining_replaces_the_previous_connection() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        let (stale_sender, mut stale_receiver) = frame_channel();
        let (fresh_sender, mut fresh_receiver) = frame_channel();

        registry.join(room, user, stale_sender);
        registry.join(room, user, fresh_sender);

        assert_eq!(registry.member_count(room), 1);

        // The superseded queue is closed once its sender is dropped
        assert_eq!(stale_receiver.recv().await, None);

        registry.broadcast(&song_started(room));
        assert!(matches!(
            decode(fresh_receiver.try_recv().unwrap()),
            DomainEvent::SongStarted { .. }
        ));
    }

    #[tokio::test]
    async fn a_superseded_connections_leave_is_ignored() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        let (stale_sender, _stale_receiver) = frame_channel();
        let (fresh_sender, _fresh_receiver) = frame_channel();

        registry.join(room, user, stale_sender.clone());
        registry.join(room, user, fresh_sender.clone());

        // The old connection tearing down must not evict the new one
        registry.leave(room, user, &stale_sender);
        assert!(registry.is_member(room, user));

        registry.leave(room, user, &fresh_sender);
        assert_eq!(registry.room_count(), 0);
    }
}

//! State reconciler.
//!
//! A pure state machine that applies the server's event stream — unordered,
//! possibly duplicated, possibly stale — onto consistent local room and
//! message state. Every event application is idempotent under redelivery.
//!
//! # Optimistic overlay
//!
//! Locally issued edits and deletes are staged in a pending overlay, never
//! written into the canonical store. The visible message sequence is a pure
//! derivation: canonical state with the overlay applied. Rolling back is
//! therefore just dropping the overlay entry; the server's confirmation
//! event writes the canonical store and clears the matching entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use confab_proto::event::ServerEvent;
use confab_proto::model::{ChatMessage, Presence, RoomInfo, User};

use crate::error::ChatError;

/// A room the session has joined. The joined sequence preserves join order,
/// which drives default frontend ordering; the core never re-sorts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRoom {
    /// Room id.
    pub id: String,
    /// Room name as confirmed by the server.
    pub name: String,
}

/// Observable consequences of applying an event or a local intent.
///
/// These tell the renderer what to re-read; they carry keys, not data, so
/// the reconciler's store stays the single source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The joined-room sequence or the focused room changed.
    RoomsChanged,

    /// The server room directory was replaced.
    DirectoryChanged,

    /// The visible messages of this room changed.
    MessagesChanged {
        /// Affected room.
        room_id: String,
    },

    /// The member list of this room changed.
    MembersChanged {
        /// Affected room.
        room_id: String,
    },

    /// The server acknowledged delivery of an own sent message.
    MessageAcknowledged {
        /// Id assigned by the server.
        message_id: String,
    },

    /// A staged optimistic change expired unconfirmed and was rolled back.
    OptimisticExpired {
        /// Room the staged change targeted.
        room_id: String,
        /// Message the staged change targeted.
        message_id: String,
    },

    /// The server reported an error, surfaced verbatim.
    ServerError {
        /// Human-readable reason.
        message: String,
    },
}

/// A staged local mutation awaiting server confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingOp {
    Edit { new_content: String },
    Delete,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    room_id: String,
    op: PendingOp,
    staged_at: Instant,
}

/// The state reconciler: rooms, messages, members, optimistic overlay.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    /// Joined rooms in join order.
    joined: Vec<JoinedRoom>,
    /// Currently focused room, if any.
    focus: Option<String>,
    /// Server room directory (all rooms, joined or not).
    directory: Vec<RoomInfo>,
    /// Canonical message store, per room, in arrival/chronological order.
    messages: HashMap<String, Vec<ChatMessage>>,
    /// Member lists, per room. Transient; replaced wholesale or patched.
    members: HashMap<String, Vec<User>>,
    /// Pending optimistic mutations, keyed by message id.
    pending: HashMap<String, PendingEntry>,
}

impl Reconciler {
    /// Create an empty reconciler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one inbound event. Idempotent under redelivery.
    pub fn apply(&mut self, event: ServerEvent) -> Vec<StateChange> {
        match event {
            // Session-level; no room/message state to touch.
            ServerEvent::Authenticated { .. } => vec![],

            ServerEvent::RoomCreated { room_id, room_name }
            | ServerEvent::RoomJoined { room_id, room_name } => self.join_room(room_id, room_name),

            ServerEvent::RoomLeft { room_id } => self.leave_room(&room_id),

            ServerEvent::RoomList { rooms } => {
                self.directory = rooms;
                vec![StateChange::DirectoryChanged]
            },

            ServerEvent::NewMessage { message } => self.append_message(message),

            ServerEvent::RoomHistory { room_id, messages } => {
                self.replace_history(room_id, messages)
            },

            ServerEvent::MessageEdited { room_id, message_id, new_content, edited_at } => {
                self.edit_message(&room_id, &message_id, new_content, edited_at)
            },

            ServerEvent::MessageDeleted { room_id, message_id } => {
                self.delete_message(&room_id, &message_id)
            },

            ServerEvent::MessageSent { message_id } => {
                vec![StateChange::MessageAcknowledged { message_id }]
            },

            ServerEvent::UserJoined { room_id, user_id, username } => {
                self.member_joined(&room_id, user_id, username)
            },

            ServerEvent::UserLeft { room_id, user_id, .. } => {
                self.member_left(&room_id, &user_id)
            },

            ServerEvent::RoomMembers { room_id, members } => {
                self.members.insert(room_id.clone(), members);
                vec![StateChange::MembersChanged { room_id }]
            },

            ServerEvent::PresenceChanged { user_id, presence, .. } => {
                self.presence_changed(&user_id, presence)
            },

            ServerEvent::Error { message } => vec![StateChange::ServerError { message }],
        }
    }

    /// Stage an optimistic edit. The visible body changes immediately; the
    /// canonical store is untouched until the server confirms.
    ///
    /// A second local edit of the same message replaces the first: last
    /// local edit wins, and the server's eventual event is authoritative
    /// regardless of arrival order.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the message is not in the room's store.
    pub fn stage_edit(
        &mut self,
        room_id: &str,
        message_id: &str,
        new_content: String,
        now: Instant,
    ) -> Result<Vec<StateChange>, ChatError> {
        self.stage(room_id, message_id, PendingOp::Edit { new_content }, now)
    }

    /// Stage an optimistic delete. The message disappears from the visible
    /// sequence immediately; the canonical store is untouched until the
    /// server confirms.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the message is not in the room's store.
    pub fn stage_delete(
        &mut self,
        room_id: &str,
        message_id: &str,
        now: Instant,
    ) -> Result<Vec<StateChange>, ChatError> {
        self.stage(room_id, message_id, PendingOp::Delete, now)
    }

    /// Drop a staged mutation without applying it.
    pub fn rollback(&mut self, message_id: &str) -> Vec<StateChange> {
        match self.pending.remove(message_id) {
            Some(entry) => vec![StateChange::MessagesChanged { room_id: entry.room_id }],
            None => vec![],
        }
    }

    /// Roll back every staged mutation older than `window`.
    ///
    /// Called periodically by the driver; the window is caller policy.
    pub fn expire_pending(&mut self, now: Instant, window: Duration) -> Vec<StateChange> {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.staged_at) >= window)
            .map(|(id, _)| id.clone())
            .collect();

        let mut changes = Vec::new();
        for message_id in expired {
            if let Some(entry) = self.pending.remove(&message_id) {
                tracing::warn!(%message_id, room_id = %entry.room_id, "optimistic change expired");
                changes.push(StateChange::OptimisticExpired {
                    room_id: entry.room_id.clone(),
                    message_id,
                });
                changes.push(StateChange::MessagesChanged { room_id: entry.room_id });
            }
        }
        changes
    }

    /// Joined rooms in join order.
    #[must_use]
    pub fn joined_rooms(&self) -> &[JoinedRoom] {
        &self.joined
    }

    /// The focused room, if any.
    #[must_use]
    pub fn focused_room(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// The server room directory.
    #[must_use]
    pub fn directory(&self) -> &[RoomInfo] {
        &self.directory
    }

    /// Member list of a room; empty if unknown.
    #[must_use]
    pub fn members(&self, room_id: &str) -> &[User] {
        self.members.get(room_id).map_or(&[], Vec::as_slice)
    }

    /// Visible messages of a room: canonical store with the optimistic
    /// overlay applied. Pure derivation; safe to call repeatedly.
    #[must_use]
    pub fn messages(&self, room_id: &str) -> Vec<ChatMessage> {
        let Some(canonical) = self.messages.get(room_id) else {
            return vec![];
        };

        canonical
            .iter()
            .filter_map(|message| match self.pending.get(&message.id) {
                Some(entry) if entry.room_id == room_id => match &entry.op {
                    PendingOp::Delete => None,
                    PendingOp::Edit { new_content } => {
                        let mut visible = message.clone();
                        visible.content = new_content.clone();
                        Some(visible)
                    },
                },
                _ => Some(message.clone()),
            })
            .collect()
    }

    /// True if a staged mutation for this message is awaiting confirmation.
    #[must_use]
    pub fn has_pending(&self, message_id: &str) -> bool {
        self.pending.contains_key(message_id)
    }

    fn stage(
        &mut self,
        room_id: &str,
        message_id: &str,
        op: PendingOp,
        now: Instant,
    ) -> Result<Vec<StateChange>, ChatError> {
        let known = self
            .messages
            .get(room_id)
            .is_some_and(|msgs| msgs.iter().any(|m| m.id == message_id));
        if !known {
            return Err(ChatError::ValidationFailed(format!(
                "no message {message_id} in room {room_id}"
            )));
        }

        self.pending.insert(
            message_id.to_string(),
            PendingEntry { room_id: room_id.to_string(), op, staged_at: now },
        );
        Ok(vec![StateChange::MessagesChanged { room_id: room_id.to_string() }])
    }

    fn join_room(&mut self, room_id: String, room_name: String) -> Vec<StateChange> {
        if self.joined.iter().any(|room| room.id == room_id) {
            return vec![];
        }

        // Focus the new room only if nothing is focused; never steal focus
        // from an already-open room.
        if self.focus.is_none() {
            self.focus = Some(room_id.clone());
        }
        self.joined.push(JoinedRoom { id: room_id, name: room_name });
        vec![StateChange::RoomsChanged]
    }

    fn leave_room(&mut self, room_id: &str) -> Vec<StateChange> {
        let before = self.joined.len();
        self.joined.retain(|room| room.id != room_id);
        if self.joined.len() == before {
            return vec![];
        }

        self.members.remove(room_id);
        if self.focus.as_deref() == Some(room_id) {
            // Fall back to the most recently joined remaining room.
            self.focus = self.joined.last().map(|room| room.id.clone());
        }
        vec![StateChange::RoomsChanged]
    }

    fn append_message(&mut self, message: ChatMessage) -> Vec<StateChange> {
        let room_id = message.room_id.clone();
        let store = self.messages.entry(room_id.clone()).or_default();
        if store.iter().any(|m| m.id == message.id) {
            // Duplicate delivery.
            return vec![];
        }

        store.push(message);
        vec![StateChange::MessagesChanged { room_id }]
    }

    fn replace_history(
        &mut self,
        room_id: String,
        mut messages: Vec<ChatMessage>,
    ) -> Vec<StateChange> {
        // The wire carries history newest-first; normalize to chronological
        // order before the snapshot replaces the store. Replacement (not
        // merge) keeps overlapping pagination windows from duplicating
        // entries.
        messages.reverse();
        self.messages.insert(room_id.clone(), messages);
        vec![StateChange::MessagesChanged { room_id }]
    }

    fn edit_message(
        &mut self,
        room_id: &str,
        message_id: &str,
        new_content: String,
        edited_at: chrono::DateTime<chrono::Utc>,
    ) -> Vec<StateChange> {
        let Some(message) = self
            .messages
            .get_mut(room_id)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == message_id))
        else {
            return vec![];
        };

        message.content = new_content;
        message.is_edited = true;
        message.edited_at = Some(edited_at);

        // Server confirmation supersedes local optimism.
        if matches!(self.pending.get(message_id), Some(entry) if matches!(entry.op, PendingOp::Edit { .. }))
        {
            self.pending.remove(message_id);
        }

        vec![StateChange::MessagesChanged { room_id: room_id.to_string() }]
    }

    fn delete_message(&mut self, room_id: &str, message_id: &str) -> Vec<StateChange> {
        let Some(store) = self.messages.get_mut(room_id) else {
            return vec![];
        };

        let before = store.len();
        store.retain(|m| m.id != message_id);
        // The message is gone either way; any staged mutation on it is moot.
        self.pending.remove(message_id);

        if store.len() == before {
            return vec![];
        }
        vec![StateChange::MessagesChanged { room_id: room_id.to_string() }]
    }

    fn member_joined(
        &mut self,
        room_id: &str,
        user_id: String,
        username: String,
    ) -> Vec<StateChange> {
        let members = self.members.entry(room_id.to_string()).or_default();
        if members.iter().any(|m| m.id == user_id) {
            return vec![];
        }

        members.push(User { id: user_id, username, presence: Presence::Online, status: None });
        vec![StateChange::MembersChanged { room_id: room_id.to_string() }]
    }

    fn member_left(&mut self, room_id: &str, user_id: &str) -> Vec<StateChange> {
        let Some(members) = self.members.get_mut(room_id) else {
            return vec![];
        };

        let before = members.len();
        members.retain(|m| m.id != user_id);
        if members.len() == before {
            return vec![];
        }
        vec![StateChange::MembersChanged { room_id: room_id.to_string() }]
    }

    fn presence_changed(&mut self, user_id: &str, presence: Presence) -> Vec<StateChange> {
        let mut changes = Vec::new();
        for (room_id, members) in &mut self.members {
            for member in members.iter_mut().filter(|m| m.id == user_id) {
                if member.presence != presence {
                    member.presence = presence;
                    changes.push(StateChange::MembersChanged { room_id: room_id.clone() });
                }
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn message(id: &str, room: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            room_id: room.to_string(),
            sender_username: "ada".to_string(),
            content: content.to_string(),
            format: confab_proto::MessageFormat::Text,
            sent_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            is_edited: false,
            edited_at: None,
        }
    }

    fn joined(reconciler: &Reconciler) -> Vec<&str> {
        reconciler.joined_rooms().iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn new_messages_preserve_arrival_order() {
        let mut rec = Reconciler::new();
        for id in ["m1", "m2", "m3"] {
            rec.apply(ServerEvent::NewMessage { message: message(id, "r1", id) });
        }

        let ids: Vec<_> = rec.messages("r1").into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn duplicate_delivery_is_idempotent() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hi") });
        let changes = rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hi") });

        assert!(changes.is_empty());
        assert_eq!(rec.messages("r1").len(), 1);
    }

    #[test]
    fn history_is_normalized_to_chronological_order() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::RoomHistory {
            room_id: "r1".to_string(),
            messages: vec![
                message("m3", "r1", "three"),
                message("m2", "r1", "two"),
                message("m1", "r1", "one"),
            ],
        });

        let ids: Vec<_> = rec.messages("r1").into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn history_replaces_wholesale() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("stale", "r1", "old") });
        rec.apply(ServerEvent::RoomHistory {
            room_id: "r1".to_string(),
            messages: vec![message("m2", "r1", "two"), message("m1", "r1", "one")],
        });

        let ids: Vec<_> = rec.messages("r1").into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn edit_of_absent_message_is_a_noop() {
        let mut rec = Reconciler::new();
        let changes = rec.apply(ServerEvent::MessageEdited {
            room_id: "r1".to_string(),
            message_id: "ghost".to_string(),
            new_content: "boo".to_string(),
            edited_at: Utc::now(),
        });

        assert!(changes.is_empty());
        assert!(rec.messages("r1").is_empty());
    }

    #[test]
    fn double_delete_equals_single_delete() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hi") });

        let delete = ServerEvent::MessageDeleted {
            room_id: "r1".to_string(),
            message_id: "m1".to_string(),
        };
        let first = rec.apply(delete.clone());
        let second = rec.apply(delete);

        assert_eq!(first, vec![StateChange::MessagesChanged { room_id: "r1".to_string() }]);
        assert!(second.is_empty());
        assert!(rec.messages("r1").is_empty());
    }

    #[test]
    fn optimistic_edit_is_visible_then_confirmed() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hello") });

        rec.stage_edit("r1", "m1", "hello2".to_string(), Instant::now()).unwrap();
        assert_eq!(rec.messages("r1")[0].content, "hello2");
        // The canonical edit marker is untouched until confirmation.
        assert!(!rec.messages("r1")[0].is_edited);
        assert!(rec.has_pending("m1"));

        rec.apply(ServerEvent::MessageEdited {
            room_id: "r1".to_string(),
            message_id: "m1".to_string(),
            new_content: "hello2".to_string(),
            edited_at: Utc::now(),
        });

        assert!(!rec.has_pending("m1"));
        let visible = rec.messages("r1");
        assert_eq!(visible[0].content, "hello2");
        assert!(visible[0].is_edited);
    }

    #[test]
    fn last_local_edit_wins_locally() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hello") });

        let now = Instant::now();
        rec.stage_edit("r1", "m1", "first".to_string(), now).unwrap();
        rec.stage_edit("r1", "m1", "second".to_string(), now).unwrap();

        assert_eq!(rec.messages("r1")[0].content, "second");
    }

    #[test]
    fn optimistic_delete_hides_until_rollback() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hello") });

        rec.stage_delete("r1", "m1", Instant::now()).unwrap();
        assert!(rec.messages("r1").is_empty());

        rec.rollback("m1");
        assert_eq!(rec.messages("r1").len(), 1);
        assert_eq!(rec.messages("r1")[0].content, "hello");
    }

    #[test]
    fn staging_against_unknown_message_fails() {
        let mut rec = Reconciler::new();
        let result = rec.stage_edit("r1", "ghost", "x".to_string(), Instant::now());
        assert!(matches!(result, Err(ChatError::ValidationFailed(_))));
    }

    #[test]
    fn expiry_rolls_back_unconfirmed_changes() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hello") });

        let staged_at = Instant::now();
        rec.stage_edit("r1", "m1", "hello2".to_string(), staged_at).unwrap();

        // Not yet expired.
        assert!(rec.expire_pending(staged_at, Duration::from_secs(10)).is_empty());

        let later = staged_at + Duration::from_secs(11);
        let changes = rec.expire_pending(later, Duration::from_secs(10));
        assert!(changes.contains(&StateChange::OptimisticExpired {
            room_id: "r1".to_string(),
            message_id: "m1".to_string(),
        }));
        assert_eq!(rec.messages("r1")[0].content, "hello");
        assert!(!rec.has_pending("m1"));
    }

    #[test]
    fn first_joined_room_takes_focus_and_later_ones_do_not() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::RoomCreated {
            room_id: "r1".to_string(),
            room_name: "alpha".to_string(),
        });
        rec.apply(ServerEvent::RoomJoined {
            room_id: "r2".to_string(),
            room_name: "beta".to_string(),
        });

        assert_eq!(joined(&rec), vec!["r1", "r2"]);
        assert_eq!(rec.focused_room(), Some("r1"));
    }

    #[test]
    fn rejoining_a_room_is_idempotent() {
        let mut rec = Reconciler::new();
        let event = ServerEvent::RoomJoined {
            room_id: "r1".to_string(),
            room_name: "alpha".to_string(),
        };
        rec.apply(event.clone());
        assert!(rec.apply(event).is_empty());
        assert_eq!(joined(&rec), vec!["r1"]);
    }

    #[test]
    fn leaving_focused_room_focuses_most_recently_joined_survivor() {
        let mut rec = Reconciler::new();
        for (id, name) in [("r1", "alpha"), ("r2", "beta"), ("r3", "gamma")] {
            rec.apply(ServerEvent::RoomJoined {
                room_id: id.to_string(),
                room_name: name.to_string(),
            });
        }
        assert_eq!(rec.focused_room(), Some("r1"));

        rec.apply(ServerEvent::RoomLeft { room_id: "r1".to_string() });
        assert_eq!(joined(&rec), vec!["r2", "r3"]);
        assert_eq!(rec.focused_room(), Some("r3"));
    }

    #[test]
    fn leaving_last_room_clears_focus() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::RoomJoined {
            room_id: "r1".to_string(),
            room_name: "alpha".to_string(),
        });
        rec.apply(ServerEvent::RoomLeft { room_id: "r1".to_string() });

        assert!(rec.joined_rooms().is_empty());
        assert_eq!(rec.focused_room(), None);
    }

    #[test]
    fn member_list_patches() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::UserJoined {
            room_id: "r1".to_string(),
            user_id: "u2".to_string(),
            username: "bob".to_string(),
        });
        assert_eq!(rec.members("r1").len(), 1);

        rec.apply(ServerEvent::PresenceChanged {
            user_id: "u2".to_string(),
            username: "bob".to_string(),
            presence: Presence::Away,
        });
        assert_eq!(rec.members("r1")[0].presence, Presence::Away);

        rec.apply(ServerEvent::UserLeft {
            room_id: "r1".to_string(),
            user_id: "u2".to_string(),
            username: "bob".to_string(),
        });
        assert!(rec.members("r1").is_empty());
    }

    #[test]
    fn server_error_surfaces_without_mutation() {
        let mut rec = Reconciler::new();
        rec.apply(ServerEvent::NewMessage { message: message("m1", "r1", "hi") });

        let changes = rec.apply(ServerEvent::Error { message: "not a member".to_string() });
        assert_eq!(
            changes,
            vec![StateChange::ServerError { message: "not a member".to_string() }]
        );
        assert_eq!(rec.messages("r1").len(), 1);
    }
}

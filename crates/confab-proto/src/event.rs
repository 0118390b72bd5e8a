//! Inbound session events.
//!
//! The server pushes these over the event channel in no guaranteed relation
//! to outbound commands: duplicated, reordered, and unsolicited deliveries
//! are all legal. Deduplication and ordering repair are the reconciler's
//! job, not the decoder's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ChatMessage, Presence, RoomInfo, User};

/// Events the server pushes over the persistent event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Channel authentication succeeded; the session is live.
    Authenticated {
        /// Authenticated user id.
        user_id: String,
        /// Authenticated display name.
        username: String,
    },

    /// A room this user created is now joined.
    RoomCreated {
        /// New room id.
        room_id: String,
        /// Room name as created.
        room_name: String,
    },

    /// A join request was confirmed.
    RoomJoined {
        /// Joined room id.
        room_id: String,
        /// Room name.
        room_name: String,
    },

    /// A leave request was confirmed.
    RoomLeft {
        /// Left room id.
        room_id: String,
    },

    /// The server's room directory.
    RoomList {
        /// All rooms known to the server.
        rooms: Vec<RoomInfo>,
    },

    /// A message was posted to a joined room.
    NewMessage {
        /// The message, including its room id.
        message: ChatMessage,
    },

    /// Delivery acknowledgement for an own sent message.
    MessageSent {
        /// Id assigned to the sent message.
        message_id: String,
    },

    /// A page of room history, newest first on the wire.
    RoomHistory {
        /// Room the page belongs to.
        room_id: String,
        /// Messages, newest first.
        messages: Vec<ChatMessage>,
    },

    /// A message body was edited.
    MessageEdited {
        /// Room the message lives in.
        room_id: String,
        /// Edited message id.
        message_id: String,
        /// Replacement body.
        new_content: String,
        /// Edit timestamp.
        edited_at: DateTime<Utc>,
    },

    /// A message was deleted.
    MessageDeleted {
        /// Room the message lived in.
        room_id: String,
        /// Deleted message id.
        message_id: String,
    },

    /// Another user joined a room this user is in.
    UserJoined {
        /// Room that gained a member.
        room_id: String,
        /// Joining user id.
        user_id: String,
        /// Joining display name.
        username: String,
    },

    /// Another user left a room this user is in.
    UserLeft {
        /// Room that lost a member.
        room_id: String,
        /// Leaving user id.
        user_id: String,
        /// Leaving display name.
        username: String,
    },

    /// The full member list of a room.
    RoomMembers {
        /// Room the list belongs to.
        room_id: String,
        /// Current members.
        members: Vec<User>,
    },

    /// A user's presence changed.
    PresenceChanged {
        /// User whose presence changed.
        user_id: String,
        /// Display name.
        username: String,
        /// New presence.
        presence: Presence,
    },

    /// The server rejected a command or hit an internal failure.
    Error {
        /// Human-readable reason, surfaced verbatim.
        message: String,
    },
}

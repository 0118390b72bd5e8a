//! Outbound session commands.
//!
//! One JSON object per text frame, tagged by `type`. Commands are
//! fire-and-forget: effects come back as [`crate::ServerEvent`]s with no
//! request-id correlation.

use serde::{Deserialize, Serialize};

use crate::model::Presence;

/// Commands the client sends over the persistent event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Authenticate the channel; must be the first command after connect.
    Authenticate {
        /// Token obtained from the credential exchange.
        token: String,
    },

    /// Create a room and implicitly join it.
    CreateRoom {
        /// Room name.
        name: String,
        /// Room description.
        desc: String,
    },

    /// Request the server's room directory.
    GetAllRooms,

    /// Join an existing room.
    JoinRoom {
        /// Room to join.
        room_id: String,
    },

    /// Leave a joined room.
    LeaveRoom {
        /// Room to leave.
        room_id: String,
    },

    /// Send a message to a room.
    SendMessage {
        /// Target room.
        room_id: String,
        /// Message body.
        content: String,
    },

    /// Replace the body of an own message.
    EditMessage {
        /// Room the message lives in.
        room_id: String,
        /// Message to edit.
        message_id: String,
        /// Replacement body.
        new_content: String,
    },

    /// Delete an own message.
    DeleteMessage {
        /// Room the message lives in.
        room_id: String,
        /// Message to delete.
        message_id: String,
    },

    /// Fetch a page of room history, newest first on the wire.
    GetRoomHistory {
        /// Room to page through.
        room_id: String,
        /// Page size; server default when absent.
        limit: Option<usize>,
        /// Messages to skip from the newest end.
        offset: Option<usize>,
    },

    /// Fetch the member list of a room.
    GetRoomMembers {
        /// Room to inspect.
        room_id: String,
    },

    /// Change own presence.
    UpdatePresence {
        /// User whose presence changes (the authenticated user).
        user_id: String,
        /// New presence.
        presence: Presence,
    },
}

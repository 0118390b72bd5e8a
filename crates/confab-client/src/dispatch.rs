//! Command dispatcher: user intents to wire commands.
//!
//! Translation is 1:1 and fire-and-forget. Validation happens here, before
//! any network call: empty-after-trimming content and room names are
//! rejected synchronously; everything that can fail asynchronously comes
//! back as an `Error` event or a transport notification instead.

use confab_core::error::ChatError;
use confab_proto::ClientCommand;
use confab_proto::model::Presence;

/// User intents accepted by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Create a room and join it.
    CreateRoom {
        /// Room name; must be non-empty after trimming.
        name: String,
        /// Room description; may be empty.
        desc: String,
    },

    /// Fetch the server room directory.
    ListRooms,

    /// Join a room.
    JoinRoom {
        /// Room to join.
        room_id: String,
    },

    /// Leave a room.
    LeaveRoom {
        /// Room to leave.
        room_id: String,
    },

    /// Send a message.
    SendMessage {
        /// Target room.
        room_id: String,
        /// Body; must be non-empty after trimming.
        content: String,
    },

    /// Edit an own message (staged optimistically).
    EditMessage {
        /// Room the message lives in.
        room_id: String,
        /// Message to edit.
        message_id: String,
        /// Replacement body; must be non-empty after trimming.
        new_content: String,
    },

    /// Delete an own message (staged optimistically).
    DeleteMessage {
        /// Room the message lives in.
        room_id: String,
        /// Message to delete.
        message_id: String,
    },

    /// Fetch a page of room history.
    FetchHistory {
        /// Room to page through.
        room_id: String,
        /// Page size.
        limit: Option<usize>,
        /// Offset from the newest end.
        offset: Option<usize>,
    },

    /// Fetch a room's member list.
    FetchMembers {
        /// Room to inspect.
        room_id: String,
    },

    /// Change own presence.
    SetPresence {
        /// New presence.
        presence: Presence,
    },
}

/// Translate an intent into its wire command, validating locally first.
///
/// `user_id` is the authenticated user, required only for presence updates.
///
/// # Errors
///
/// `ValidationFailed` for empty-after-trimming content or room names, and
/// for presence updates before authentication completes.
pub fn command_for(intent: Intent, user_id: Option<&str>) -> Result<ClientCommand, ChatError> {
    match intent {
        Intent::CreateRoom { name, desc } => {
            let name = non_empty(&name, "room name")?;
            Ok(ClientCommand::CreateRoom { name, desc: desc.trim().to_string() })
        },

        Intent::ListRooms => Ok(ClientCommand::GetAllRooms),

        Intent::JoinRoom { room_id } => Ok(ClientCommand::JoinRoom { room_id }),

        Intent::LeaveRoom { room_id } => Ok(ClientCommand::LeaveRoom { room_id }),

        Intent::SendMessage { room_id, content } => {
            let content = non_empty(&content, "message content")?;
            Ok(ClientCommand::SendMessage { room_id, content })
        },

        Intent::EditMessage { room_id, message_id, new_content } => {
            let new_content = non_empty(&new_content, "message content")?;
            Ok(ClientCommand::EditMessage { room_id, message_id, new_content })
        },

        Intent::DeleteMessage { room_id, message_id } => {
            Ok(ClientCommand::DeleteMessage { room_id, message_id })
        },

        Intent::FetchHistory { room_id, limit, offset } => {
            Ok(ClientCommand::GetRoomHistory { room_id, limit, offset })
        },

        Intent::FetchMembers { room_id } => Ok(ClientCommand::GetRoomMembers { room_id }),

        Intent::SetPresence { presence } => match user_id {
            Some(user_id) => {
                Ok(ClientCommand::UpdatePresence { user_id: user_id.to_string(), presence })
            },
            None => Err(ChatError::ValidationFailed(
                "presence updates require an authenticated session".to_string(),
            )),
        },
    }
}

fn non_empty(value: &str, what: &str) -> Result<String, ChatError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ChatError::ValidationFailed(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_trims_content() {
        let cmd = command_for(
            Intent::SendMessage { room_id: "r1".to_string(), content: "  hi  ".to_string() },
            None,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::SendMessage { room_id: "r1".to_string(), content: "hi".to_string() }
        );
    }

    #[test]
    fn empty_message_is_rejected_locally() {
        let result = command_for(
            Intent::SendMessage { room_id: "r1".to_string(), content: "   ".to_string() },
            None,
        );
        assert!(matches!(result, Err(ChatError::ValidationFailed(_))));
    }

    #[test]
    fn empty_room_name_is_rejected_locally() {
        let result = command_for(
            Intent::CreateRoom { name: "\t".to_string(), desc: String::new() },
            None,
        );
        assert!(matches!(result, Err(ChatError::ValidationFailed(_))));
    }

    #[test]
    fn empty_edit_never_reaches_the_server() {
        let result = command_for(
            Intent::EditMessage {
                room_id: "r1".to_string(),
                message_id: "m1".to_string(),
                new_content: String::new(),
            },
            None,
        );
        assert!(matches!(result, Err(ChatError::ValidationFailed(_))));
    }

    #[test]
    fn presence_requires_authenticated_user() {
        let denied = command_for(Intent::SetPresence { presence: Presence::Away }, None);
        assert!(matches!(denied, Err(ChatError::ValidationFailed(_))));

        let cmd = command_for(Intent::SetPresence { presence: Presence::Away }, Some("u1")).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::UpdatePresence { user_id: "u1".to_string(), presence: Presence::Away }
        );
    }

    #[test]
    fn history_maps_one_to_one() {
        let cmd = command_for(
            Intent::FetchHistory { room_id: "r1".to_string(), limit: Some(25), offset: Some(50) },
            None,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::GetRoomHistory {
                room_id: "r1".to_string(),
                limit: Some(25),
                offset: Some(50),
            }
        );
    }
}

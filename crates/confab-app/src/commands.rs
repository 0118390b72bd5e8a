//! Command parsing for text-based frontends.
//!
//! Parses input strings into structured [`Command`] values. Commands start
//! with `/`; anything else is a message to the focused room.

use confab_proto::model::Presence;

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a room and join it.
    CreateRoom {
        /// Room name.
        name: String,
        /// Room description (rest of the line).
        desc: String,
    },

    /// Fetch the server room directory.
    ListRooms,

    /// Join a room by id.
    JoinRoom {
        /// Room id.
        room_id: String,
    },

    /// Leave the focused room.
    LeaveFocusedRoom,

    /// Fetch history for the focused room.
    History {
        /// Page size.
        limit: Option<usize>,
        /// Offset from the newest end.
        offset: Option<usize>,
    },

    /// Fetch the focused room's member list.
    Members,

    /// Change own presence.
    Presence {
        /// New presence.
        presence: Presence,
    },

    /// Edit a message in the focused room.
    Edit {
        /// Message id.
        message_id: String,
        /// Replacement body.
        new_content: String,
    },

    /// Delete a message in the focused room.
    Delete {
        /// Message id.
        message_id: String,
    },

    /// Quit the application.
    Quit,

    /// Send a message to the focused room.
    Message {
        /// Message content.
        content: String,
    },

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse a user input string into a command.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Message { content: String::new() };
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "create" => match parts.get(1) {
            Some(name) => {
                Command::CreateRoom { name: (*name).to_string(), desc: parts[2..].join(" ") }
            },
            None => Command::InvalidArgs {
                command: "create".into(),
                error: "Usage: /create <name> [description]".into(),
            },
        },

        "rooms" => Command::ListRooms,

        "join" => match parts.get(1) {
            Some(room_id) => Command::JoinRoom { room_id: (*room_id).to_string() },
            None => Command::InvalidArgs {
                command: "join".into(),
                error: "Usage: /join <room_id>".into(),
            },
        },

        "leave" => Command::LeaveFocusedRoom,

        "history" => {
            let limit = parts.get(1).map(|s| s.parse::<usize>());
            let offset = parts.get(2).map(|s| s.parse::<usize>());
            match (limit, offset) {
                (Some(Err(_)), _) | (_, Some(Err(_))) => Command::InvalidArgs {
                    command: "history".into(),
                    error: "Usage: /history [limit [offset]]".into(),
                },
                (limit, offset) => Command::History {
                    limit: limit.and_then(Result::ok),
                    offset: offset.and_then(Result::ok),
                },
            }
        },

        "members" => Command::Members,

        "presence" => match parts.get(1).copied().and_then(parse_presence) {
            Some(presence) => Command::Presence { presence },
            None => Command::InvalidArgs {
                command: "presence".into(),
                error: "Usage: /presence online|away|offline|dnd|invisible".into(),
            },
        },

        "edit" => match (parts.get(1), parts.get(2)) {
            (Some(message_id), Some(_)) => Command::Edit {
                message_id: (*message_id).to_string(),
                new_content: parts[2..].join(" "),
            },
            _ => Command::InvalidArgs {
                command: "edit".into(),
                error: "Usage: /edit <message_id> <new content>".into(),
            },
        },

        "delete" => match parts.get(1) {
            Some(message_id) => Command::Delete { message_id: (*message_id).to_string() },
            None => Command::InvalidArgs {
                command: "delete".into(),
                error: "Usage: /delete <message_id>".into(),
            },
        },

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}

fn parse_presence(word: &str) -> Option<Presence> {
    match word.to_ascii_lowercase().as_str() {
        "online" => Some(Presence::Online),
        "away" => Some(Presence::Away),
        "offline" => Some(Presence::Offline),
        "dnd" | "busy" => Some(Presence::DoNotDisturb),
        "invisible" | "hidden" => Some(Presence::AppearOffline),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_message() {
        assert_eq!(parse("hello world"), Command::Message { content: "hello world".into() });
    }

    #[test]
    fn parse_create_with_description() {
        assert_eq!(
            parse("/create general the main room"),
            Command::CreateRoom { name: "general".into(), desc: "the main room".into() }
        );
    }

    #[test]
    fn parse_create_missing_name() {
        assert!(
            matches!(parse("/create"), Command::InvalidArgs { command, .. } if command == "create")
        );
    }

    #[test]
    fn parse_join() {
        assert_eq!(parse("/join r42"), Command::JoinRoom { room_id: "r42".into() });
    }

    #[test]
    fn parse_leave() {
        assert_eq!(parse("/leave"), Command::LeaveFocusedRoom);
    }

    #[test]
    fn parse_history_with_page() {
        assert_eq!(parse("/history 50 100"), Command::History { limit: Some(50), offset: Some(100) });
        assert_eq!(parse("/history"), Command::History { limit: None, offset: None });
    }

    #[test]
    fn parse_history_rejects_garbage() {
        assert!(matches!(parse("/history many"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_presence_words() {
        assert_eq!(parse("/presence dnd"), Command::Presence { presence: Presence::DoNotDisturb });
        assert!(matches!(parse("/presence sleepy"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_edit() {
        assert_eq!(
            parse("/edit m7 fixed the typo"),
            Command::Edit { message_id: "m7".into(), new_content: "fixed the typo".into() }
        );
        assert!(matches!(parse("/edit m7"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_quit() {
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/q"), Command::Quit);
    }

    #[test]
    fn parse_unknown_command() {
        assert!(matches!(parse("/frobnicate"), Command::Unknown { .. }));
    }
}

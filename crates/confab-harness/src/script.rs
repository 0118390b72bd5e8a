//! Scripted in-memory chat service.
//!
//! Implements just enough of the server's observable behavior to exercise
//! the client: token authentication, rooms with membership, message
//! storage with newest-first history pages, and presence fan-out. Wire
//! timestamps come from a deterministic counter clock, so scenario runs are
//! reproducible.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use confab_proto::command::ClientCommand;
use confab_proto::event::ServerEvent;
use confab_proto::model::{ChatMessage, MessageFormat, Presence, RoomInfo, User};

#[derive(Debug, Clone)]
struct RoomRecord {
    name: String,
    desc: String,
    messages: Vec<ChatMessage>,
}

/// Scripted chat service. Keyed by client name rather than socket; the
/// scenario world routes returned `(target, event)` pairs to the matching
/// client machine.
#[derive(Debug)]
pub struct ScriptedServer {
    /// Accepted tokens and the identity they authenticate.
    tokens: HashMap<String, (String, String)>,
    /// Authenticated sessions: client name to (user id, username).
    sessions: HashMap<String, (String, String)>,
    rooms: BTreeMap<String, RoomRecord>,
    /// Room membership by client name.
    members: HashMap<String, BTreeSet<String>>,
    next_room: u64,
    next_message: u64,
    ticks: i64,
}

impl ScriptedServer {
    /// Create an empty service.
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            sessions: HashMap::new(),
            rooms: BTreeMap::new(),
            members: HashMap::new(),
            next_room: 0,
            next_message: 0,
            ticks: 0,
        }
    }

    /// Accept `token` as authenticating the given identity.
    pub fn register_token(&mut self, token: &str, user_id: &str, username: &str) {
        self.tokens.insert(token.to_string(), (user_id.to_string(), username.to_string()));
    }

    /// Messages stored for a room, in chronological order. For oracles.
    #[must_use]
    pub fn stored_messages(&self, room_id: &str) -> &[ChatMessage] {
        self.rooms.get(room_id).map_or(&[], |record| record.messages.as_slice())
    }

    /// Process one command from `client` and return the events it causes,
    /// each paired with the client name it is delivered to.
    pub fn process(
        &mut self,
        client: &str,
        command: &ClientCommand,
    ) -> Vec<(String, ServerEvent)> {
        match command {
            ClientCommand::Authenticate { token } => self.authenticate(client, token),
            ClientCommand::CreateRoom { name, desc } => self.create_room(client, name, desc),
            ClientCommand::GetAllRooms => self.room_list(client),
            ClientCommand::JoinRoom { room_id } => self.join_room(client, room_id),
            ClientCommand::LeaveRoom { room_id } => self.leave_room(client, room_id),
            ClientCommand::SendMessage { room_id, content } => {
                self.send_message(client, room_id, content)
            },
            ClientCommand::EditMessage { room_id, message_id, new_content } => {
                self.edit_message(client, room_id, message_id, new_content)
            },
            ClientCommand::DeleteMessage { room_id, message_id } => {
                self.delete_message(client, room_id, message_id)
            },
            ClientCommand::GetRoomHistory { room_id, limit, offset } => {
                self.room_history(client, room_id, *limit, *offset)
            },
            ClientCommand::GetRoomMembers { room_id } => self.room_members(client, room_id),
            ClientCommand::UpdatePresence { user_id, presence } => {
                self.update_presence(user_id, *presence)
            },
        }
    }

    fn authenticate(&mut self, client: &str, token: &str) -> Vec<(String, ServerEvent)> {
        match self.tokens.get(token) {
            Some((user_id, username)) => {
                self.sessions.insert(client.to_string(), (user_id.clone(), username.clone()));
                vec![(
                    client.to_string(),
                    ServerEvent::Authenticated {
                        user_id: user_id.clone(),
                        username: username.clone(),
                    },
                )]
            },
            None => vec![(
                client.to_string(),
                ServerEvent::Error { message: "Invalid session token".to_string() },
            )],
        }
    }

    fn create_room(&mut self, client: &str, name: &str, desc: &str) -> Vec<(String, ServerEvent)> {
        self.next_room += 1;
        let room_id = format!("r{}", self.next_room);
        self.rooms.insert(
            room_id.clone(),
            RoomRecord { name: name.to_string(), desc: desc.to_string(), messages: vec![] },
        );
        self.members.entry(room_id.clone()).or_default().insert(client.to_string());
        vec![(
            client.to_string(),
            ServerEvent::RoomCreated { room_id, room_name: name.to_string() },
        )]
    }

    fn room_list(&self, client: &str) -> Vec<(String, ServerEvent)> {
        let rooms = self
            .rooms
            .iter()
            .map(|(id, record)| RoomInfo {
                id: id.clone(),
                name: record.name.clone(),
                desc: record.desc.clone(),
            })
            .collect();
        vec![(client.to_string(), ServerEvent::RoomList { rooms })]
    }

    fn join_room(&mut self, client: &str, room_id: &str) -> Vec<(String, ServerEvent)> {
        let Some(record) = self.rooms.get(room_id) else {
            return vec![(
                client.to_string(),
                ServerEvent::Error { message: format!("No such room: {room_id}") },
            )];
        };
        let room_name = record.name.clone();

        let mut deliveries = vec![(
            client.to_string(),
            ServerEvent::RoomJoined { room_id: room_id.to_string(), room_name },
        )];

        if let Some((user_id, username)) = self.sessions.get(client).cloned() {
            for peer in self.members.entry(room_id.to_string()).or_default().iter() {
                deliveries.push((
                    peer.clone(),
                    ServerEvent::UserJoined {
                        room_id: room_id.to_string(),
                        user_id: user_id.clone(),
                        username: username.clone(),
                    },
                ));
            }
        }
        self.members.entry(room_id.to_string()).or_default().insert(client.to_string());
        deliveries
    }

    fn leave_room(&mut self, client: &str, room_id: &str) -> Vec<(String, ServerEvent)> {
        if let Some(members) = self.members.get_mut(room_id) {
            members.remove(client);
        }

        let mut deliveries =
            vec![(client.to_string(), ServerEvent::RoomLeft { room_id: room_id.to_string() })];

        if let Some((user_id, username)) = self.sessions.get(client).cloned() {
            for peer in self.members.get(room_id).into_iter().flatten() {
                deliveries.push((
                    peer.clone(),
                    ServerEvent::UserLeft {
                        room_id: room_id.to_string(),
                        user_id: user_id.clone(),
                        username: username.clone(),
                    },
                ));
            }
        }
        deliveries
    }

    fn send_message(
        &mut self,
        client: &str,
        room_id: &str,
        content: &str,
    ) -> Vec<(String, ServerEvent)> {
        let sender_username = self
            .sessions
            .get(client)
            .map_or_else(|| client.to_string(), |(_, username)| username.clone());

        if !self.rooms.contains_key(room_id) {
            return vec![(
                client.to_string(),
                ServerEvent::Error { message: format!("No such room: {room_id}") },
            )];
        }

        self.next_message += 1;
        self.ticks += 1;
        let message = ChatMessage {
            id: format!("m{}", self.next_message),
            room_id: room_id.to_string(),
            sender_username,
            content: content.to_string(),
            format: MessageFormat::Text,
            sent_at: self.timestamp(),
            is_edited: false,
            edited_at: None,
        };
        if let Some(record) = self.rooms.get_mut(room_id) {
            record.messages.push(message.clone());
        }

        let mut deliveries =
            vec![(client.to_string(), ServerEvent::MessageSent { message_id: message.id.clone() })];
        for peer in self.members.get(room_id).into_iter().flatten() {
            deliveries
                .push((peer.clone(), ServerEvent::NewMessage { message: message.clone() }));
        }
        deliveries
    }

    fn edit_message(
        &mut self,
        client: &str,
        room_id: &str,
        message_id: &str,
        new_content: &str,
    ) -> Vec<(String, ServerEvent)> {
        self.ticks += 1;
        let edited_at = self.timestamp();

        let edited = self.rooms.get_mut(room_id).is_some_and(|record| {
            record.messages.iter_mut().any(|m| {
                if m.id == message_id {
                    m.content = new_content.to_string();
                    m.is_edited = true;
                    m.edited_at = Some(edited_at);
                    true
                } else {
                    false
                }
            })
        });

        if !edited {
            return vec![(
                client.to_string(),
                ServerEvent::Error { message: format!("No such message: {message_id}") },
            )];
        }

        self.members
            .get(room_id)
            .into_iter()
            .flatten()
            .map(|peer| {
                (
                    peer.clone(),
                    ServerEvent::MessageEdited {
                        room_id: room_id.to_string(),
                        message_id: message_id.to_string(),
                        new_content: new_content.to_string(),
                        edited_at,
                    },
                )
            })
            .collect()
    }

    fn delete_message(
        &mut self,
        client: &str,
        room_id: &str,
        message_id: &str,
    ) -> Vec<(String, ServerEvent)> {
        let deleted = self.rooms.get_mut(room_id).is_some_and(|record| {
            let before = record.messages.len();
            record.messages.retain(|m| m.id != message_id);
            record.messages.len() != before
        });

        if !deleted {
            return vec![(
                client.to_string(),
                ServerEvent::Error { message: format!("No such message: {message_id}") },
            )];
        }

        self.members
            .get(room_id)
            .into_iter()
            .flatten()
            .map(|peer| {
                (
                    peer.clone(),
                    ServerEvent::MessageDeleted {
                        room_id: room_id.to_string(),
                        message_id: message_id.to_string(),
                    },
                )
            })
            .collect()
    }

    fn room_history(
        &self,
        client: &str,
        room_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Vec<(String, ServerEvent)> {
        let Some(record) = self.rooms.get(room_id) else {
            return vec![(
                client.to_string(),
                ServerEvent::Error { message: format!("No such room: {room_id}") },
            )];
        };

        // Pages go out newest first, like the real service.
        let messages: Vec<ChatMessage> = record
            .messages
            .iter()
            .rev()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(100))
            .cloned()
            .collect();

        vec![(
            client.to_string(),
            ServerEvent::RoomHistory { room_id: room_id.to_string(), messages },
        )]
    }

    fn room_members(&self, client: &str, room_id: &str) -> Vec<(String, ServerEvent)> {
        let members: Vec<User> = self
            .members
            .get(room_id)
            .into_iter()
            .flatten()
            .filter_map(|peer| self.sessions.get(peer))
            .map(|(user_id, username)| User {
                id: user_id.clone(),
                username: username.clone(),
                presence: Presence::Online,
                status: None,
            })
            .collect();

        vec![(
            client.to_string(),
            ServerEvent::RoomMembers { room_id: room_id.to_string(), members },
        )]
    }

    fn update_presence(&self, user_id: &str, presence: Presence) -> Vec<(String, ServerEvent)> {
        let Some(username) = self
            .sessions
            .values()
            .find(|(id, _)| id == user_id)
            .map(|(_, username)| username.clone())
        else {
            return vec![];
        };

        self.sessions
            .keys()
            .map(|peer| {
                (
                    peer.clone(),
                    ServerEvent::PresenceChanged {
                        user_id: user_id.to_string(),
                        username: username.clone(),
                        presence,
                    },
                )
            })
            .collect()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        #[allow(clippy::unwrap_used)]
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        base + ChronoDuration::seconds(self.ticks)
    }
}

impl Default for ScriptedServer {
    fn default() -> Self {
        Self::new()
    }
}

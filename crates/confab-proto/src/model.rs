//! Shared data model: rooms, users, messages.
//!
//! Field names and tag spellings match the chat service's JSON exactly;
//! timestamps are RFC 3339 via chrono's serde support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presence state of a user.
///
/// Serialized internally tagged, e.g. `{"type":"DoNotDisturb"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Presence {
    /// Actively connected.
    Online,
    /// Connected but idle.
    Away,
    /// Not connected.
    Offline,
    /// Connected, suppressing notifications.
    DoNotDisturb,
    /// Connected but shown as offline to others.
    AppearOffline,
}

/// A user as reported by the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id.
    pub id: String,
    /// Display name.
    pub username: String,
    /// Current presence.
    pub presence: Presence,
    /// Free-form status line, if any.
    #[serde(default)]
    pub status: Option<String>,
}

/// Room metadata from the server directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    /// Server-assigned room id.
    pub id: String,
    /// Room name.
    pub name: String,
    /// Room description.
    #[serde(default)]
    pub desc: String,
}

/// Rendering format of a message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageFormat {
    /// Plain text.
    #[default]
    Text,
    /// Markdown source; rendering is the frontend's concern.
    Markdown,
}

/// A chat message scoped to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned message id, unique within the room.
    pub id: String,
    /// Room the message belongs to.
    pub room_id: String,
    /// Sender display name.
    pub sender_username: String,
    /// Message body.
    pub content: String,
    /// Body format.
    #[serde(default)]
    pub format: MessageFormat,
    /// Server-side send timestamp.
    pub sent_at: DateTime<Utc>,
    /// Whether the body has been edited since sending.
    #[serde(default)]
    pub is_edited: bool,
    /// Timestamp of the last edit, if any.
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

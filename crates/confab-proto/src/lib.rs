//! Wire format for the Confab chat protocol.
//!
//! Two exchanges share this crate: the one-shot credential protocol (a single
//! JSON object per request and response over a plain TCP stream) and the
//! session protocol (one JSON object per text frame on the persistent event
//! channel). All objects are internally tagged: requests and session traffic
//! by `type`, credential responses by `status`.
//!
//! This crate is pure data plus serialization. It performs no I/O, so the
//! same types are shared by the production transport and the deterministic
//! test harness.
//!
//! # Components
//!
//! - [`auth`]: credential protocol requests and responses
//! - [`command`]: outbound session commands
//! - [`event`]: inbound session events
//! - [`model`]: rooms, users, messages
//! - [`codec`]: encode/decode helpers and the incremental response buffer
//! - [`errors`]: protocol error types

pub mod auth;
pub mod codec;
pub mod command;
pub mod errors;
pub mod event;
pub mod model;

pub use auth::{AuthGrant, AuthRequest, AuthResponse};
pub use codec::ResponseBuffer;
pub use command::ClientCommand;
pub use errors::{ProtocolError, Result};
pub use event::ServerEvent;
pub use model::{ChatMessage, MessageFormat, Presence, RoomInfo, User};

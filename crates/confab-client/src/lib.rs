//! Client machine and transport drivers for the Confab chat protocol.
//!
//! The heart of this crate is [`Client`], a pure action-based state machine
//! composing the session lifecycle, the state reconciler, and the command
//! dispatcher: feed it [`ClientEvent`]s, execute the [`ClientAction`]s it
//! returns. No I/O happens inside the machine, so the deterministic harness
//! drives exactly the code the production driver runs.
//!
//! I/O lives at the edges:
//!
//! - [`auth::AuthClient`]: the one-shot credential exchange over TCP
//! - [`transport`] (feature `transport`): a tokio/WebSocket driver that owns
//!   the machine, executes its actions, and publishes notifications to
//!   subscribers

pub mod auth;
pub mod client;
pub mod dispatch;
#[cfg(feature = "transport")]
pub mod transport;

pub use auth::AuthClient;
pub use client::{Client, ClientAction, ClientConfig, ClientEvent, Notification};
pub use dispatch::{Intent, command_for};
#[cfg(feature = "transport")]
pub use transport::{SessionHandle, Subscription};

//! Confab protocol core logic.
//!
//! Pure state machine logic for the chat client, completely decoupled from
//! I/O. This enables deterministic testing: the same code runs under the
//! production WebSocket driver and under the simulation harness.
//!
//! # Architecture
//!
//! State transitions produce declarative actions that describe intended
//! effects rather than executing them directly. A runtime or test harness
//! is responsible for interpreting and executing those actions. Methods that
//! need time accept an `Instant` parameter; no clock is stored, so tests can
//! drive virtual time.
//!
//! # Components
//!
//! - [`session`]: session connection state machine (connect, authenticate,
//!   reconnect, command queueing)
//! - [`reconcile`]: state reconciler (rooms, messages, members, optimistic
//!   overlay)
//! - [`error`]: client error taxonomy

pub mod error;
pub mod reconcile;
pub mod session;

pub use error::{ChatError, SessionError};
pub use reconcile::{JoinedRoom, Reconciler, StateChange};
pub use session::{Session, SessionAction, SessionConfig, SessionNotice, SessionState};

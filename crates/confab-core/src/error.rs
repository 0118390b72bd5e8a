//! Client error taxonomy.

use thiserror::Error;

use crate::session::SessionState;

/// Failures surfaced to callers of the chat client.
///
/// Network-correlated failures are a single result per call, never partial
/// state. Session-level failures are reported as notifications rather than
/// thrown across the event loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// A credential exchange did not complete within its deadline.
    #[error("request timed out")]
    RequestTimeout,

    /// The remote service rejected the request.
    #[error("rejected by server: {0}")]
    RemoteRejected(String),

    /// The transport closed before a complete response was parsed.
    #[error("connection closed before a response arrived")]
    ConnectionClosedEarly,

    /// The persistent event channel dropped.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Local validation rejected the input before any network call.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The server reported an error event.
    #[error("server error: {0}")]
    ServerError(String),
}

/// Session state machine misuse.
///
/// These indicate a driver bug (calling a transition from the wrong state),
/// not a runtime condition, and are kept separate from [`ChatError`] so they
/// cannot be confused with network failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A transition was attempted from a state that does not allow it.
    #[error("operation {operation} is invalid in state {state:?}")]
    InvalidState {
        /// State the session was in.
        state: SessionState,
        /// Transition that was attempted.
        operation: &'static str,
    },
}

//! Session connection state machine.
//!
//! This module implements the session layer: connection lifecycle,
//! channel authentication, command queueing, and the single bounded
//! reconnect attempt.
//!
//! # Architecture: Action-Based State Machine
//!
//! The machine follows the action pattern:
//! - Methods return `Vec<SessionAction>` describing intended effects
//! - Driver code executes actions (open the channel, transmit, sleep)
//! - No I/O and no stored clock, so the same code runs under the
//!   production driver and the simulation harness
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ connect ┌────────────┐ opened ┌────────────────┐
//! │ Disconnected │────────>│ Connecting │───────>│ Authenticating │
//! └──────────────┘         └────────────┘        └────────────────┘
//!        ▲                       ▲                       │ Authenticated
//!        │ disconnect /          │ reconnect_due         ▼
//!        │ channel_closed   ┌──────────────┐  drop   ┌──────┐
//!        └──────────────────│ Reconnecting │<────────│ Live │
//!                           └──────────────┘         └──────┘
//! ```
//!
//! A drop from `Live` moves to `Reconnecting` only when auto-reconnect is
//! enabled; exactly one reconnect attempt is scheduled, and an explicit
//! `disconnect` always wins over a pending attempt.

use std::collections::VecDeque;
use std::time::Duration;

use confab_proto::ClientCommand;

use crate::error::SessionError;

/// Session connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No channel; terminal after an explicit disconnect.
    Disconnected,
    /// Channel being established.
    Connecting,
    /// Channel open, `Authenticate` sent, awaiting confirmation.
    Authenticating,
    /// Authenticated; commands transmit immediately.
    Live,
    /// Channel dropped from `Live`; one reconnect attempt pending.
    Reconnecting,
}

/// Actions returned by the session state machine.
///
/// The driver executes these:
/// - `OpenChannel`: establish the persistent event channel
/// - `Transmit`: serialize and send the command over the channel
/// - `CloseChannel`: tear the channel down if one is open
/// - `ScheduleReconnect`: arm a one-shot timer, then feed `reconnect_due`
/// - `Notify`: surface a connectivity notice to the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Establish the persistent event channel.
    OpenChannel,

    /// Serialize and send this command over the channel.
    Transmit(ClientCommand),

    /// Tear the channel down if one is open.
    CloseChannel,

    /// Arm the one-shot reconnect timer for this delay.
    ScheduleReconnect {
        /// Delay before the attempt.
        delay: Duration,
    },

    /// Surface a connectivity notice to the renderer.
    Notify(SessionNotice),
}

/// Connectivity notices surfaced to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// Authentication completed; the session is live.
    Live {
        /// Authenticated user id.
        user_id: String,
        /// Authenticated display name.
        username: String,
    },

    /// The channel dropped or failed to establish.
    ///
    /// Joined-room state is preserved locally but stale until the server
    /// re-delivers it; the core does not auto-rejoin rooms.
    ConnectionLost {
        /// Transport-level reason.
        reason: String,
        /// True if a reconnect attempt was scheduled.
        reconnecting: bool,
    },
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reconnect once after an unexpected drop from `Live`.
    pub auto_reconnect: bool,
    /// Delay before the reconnect attempt.
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { auto_reconnect: true, reconnect_delay: Duration::from_secs(2) }
    }
}

/// Session connection state machine.
///
/// Explicitly constructed and explicitly owned; at most one per user
/// session, passed to dependents rather than held in a global.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    config: SessionConfig,
    token: Option<String>,
    user_id: Option<String>,
    username: Option<String>,
    /// Commands issued before the session went live, in issuance order.
    queue: VecDeque<ClientCommand>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            config,
            token: None,
            user_id: None,
            username: None,
            queue: VecDeque::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once authentication has completed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state == SessionState::Live
    }

    /// Authenticated user id, if live (or previously live this session).
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Authenticated display name, if known.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Begin connecting with this token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is `Disconnected`.
    pub fn connect(&mut self, token: String) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::InvalidState { state: self.state, operation: "connect" });
        }

        self.token = Some(token);
        self.state = SessionState::Connecting;
        Ok(vec![SessionAction::OpenChannel])
    }

    /// The driver established the channel; authenticate it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is `Connecting`.
    pub fn channel_opened(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "channel_opened",
            });
        }

        let Some(token) = self.token.clone() else {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "channel_opened",
            });
        };

        self.state = SessionState::Authenticating;
        Ok(vec![SessionAction::Transmit(ClientCommand::Authenticate { token })])
    }

    /// The server confirmed authentication; go live and flush the queue.
    ///
    /// Queued commands are flushed in issuance order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is `Authenticating`.
    pub fn authenticated(
        &mut self,
        user_id: String,
        username: String,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Authenticating {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "authenticated",
            });
        }

        self.state = SessionState::Live;
        self.user_id = Some(user_id.clone());
        self.username = Some(username.clone());

        let mut actions =
            vec![SessionAction::Notify(SessionNotice::Live { user_id, username })];
        actions.extend(self.queue.drain(..).map(SessionAction::Transmit));
        Ok(actions)
    }

    /// Send a command: transmit when live, queue otherwise.
    pub fn send(&mut self, command: ClientCommand) -> Vec<SessionAction> {
        if self.state == SessionState::Live {
            vec![SessionAction::Transmit(command)]
        } else {
            self.queue.push_back(command);
            vec![]
        }
    }

    /// The channel closed or errored.
    ///
    /// From `Live` with auto-reconnect enabled this schedules exactly one
    /// reconnect attempt; any other non-terminal state surfaces the loss and
    /// goes `Disconnected`. Safe to call redundantly.
    pub fn channel_closed(&mut self, reason: &str) -> Vec<SessionAction> {
        match self.state {
            SessionState::Disconnected | SessionState::Reconnecting => vec![],
            SessionState::Live if self.config.auto_reconnect => {
                self.state = SessionState::Reconnecting;
                vec![
                    SessionAction::Notify(SessionNotice::ConnectionLost {
                        reason: reason.to_string(),
                        reconnecting: true,
                    }),
                    SessionAction::ScheduleReconnect { delay: self.config.reconnect_delay },
                ]
            },
            SessionState::Connecting | SessionState::Authenticating | SessionState::Live => {
                self.state = SessionState::Disconnected;
                vec![SessionAction::Notify(SessionNotice::ConnectionLost {
                    reason: reason.to_string(),
                    reconnecting: false,
                })]
            },
        }
    }

    /// The reconnect timer elapsed.
    ///
    /// A no-op unless the session is still `Reconnecting`: an explicit
    /// disconnect in the meantime wins and cancels the attempt.
    pub fn reconnect_due(&mut self) -> Vec<SessionAction> {
        if self.state != SessionState::Reconnecting {
            return vec![];
        }

        self.state = SessionState::Connecting;
        vec![SessionAction::OpenChannel]
    }

    /// Close the session; idempotent and terminal.
    ///
    /// Cancels any pending reconnect and drops queued commands.
    pub fn disconnect(&mut self) -> Vec<SessionAction> {
        if self.state == SessionState::Disconnected {
            return vec![];
        }

        self.state = SessionState::Disconnected;
        self.queue.clear();
        vec![SessionAction::CloseChannel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_session() -> Session {
        let mut session = Session::new(SessionConfig::default());
        session.connect("tok".to_string()).unwrap();
        session.channel_opened().unwrap();
        session.authenticated("u1".to_string(), "ada".to_string()).unwrap();
        session
    }

    #[test]
    fn session_lifecycle() {
        let mut session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Disconnected);

        let actions = session.connect("tok".to_string()).unwrap();
        assert_eq!(actions, vec![SessionAction::OpenChannel]);
        assert_eq!(session.state(), SessionState::Connecting);

        let actions = session.channel_opened().unwrap();
        assert_eq!(
            actions,
            vec![SessionAction::Transmit(ClientCommand::Authenticate { token: "tok".to_string() })]
        );
        assert_eq!(session.state(), SessionState::Authenticating);

        let actions = session.authenticated("u1".to_string(), "ada".to_string()).unwrap();
        assert_eq!(session.state(), SessionState::Live);
        assert_eq!(session.user_id(), Some("u1"));
        assert!(matches!(actions[0], SessionAction::Notify(SessionNotice::Live { .. })));

        let actions = session.disconnect();
        assert_eq!(actions, vec![SessionAction::CloseChannel]);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn commands_queue_until_live_and_flush_in_order() {
        let mut session = Session::new(SessionConfig::default());
        session.connect("tok".to_string()).unwrap();

        assert!(session.send(ClientCommand::GetAllRooms).is_empty());
        assert!(
            session.send(ClientCommand::JoinRoom { room_id: "r1".to_string() }).is_empty()
        );

        session.channel_opened().unwrap();
        let actions = session.authenticated("u1".to_string(), "ada".to_string()).unwrap();

        let transmitted: Vec<_> = actions
            .into_iter()
            .filter_map(|a| match a {
                SessionAction::Transmit(cmd) => Some(cmd),
                _ => None,
            })
            .collect();
        assert_eq!(
            transmitted,
            vec![
                ClientCommand::GetAllRooms,
                ClientCommand::JoinRoom { room_id: "r1".to_string() },
            ]
        );

        // Live now: commands transmit immediately.
        let actions = session.send(ClientCommand::GetAllRooms);
        assert_eq!(actions, vec![SessionAction::Transmit(ClientCommand::GetAllRooms)]);
    }

    #[test]
    fn drop_from_live_schedules_one_reconnect() {
        let mut session = live_session();

        let actions = session.channel_closed("reset by peer");
        assert_eq!(session.state(), SessionState::Reconnecting);
        assert!(matches!(
            actions[0],
            SessionAction::Notify(SessionNotice::ConnectionLost { reconnecting: true, .. })
        ));
        assert!(matches!(actions[1], SessionAction::ScheduleReconnect { .. }));

        // A redundant close while waiting changes nothing.
        assert!(session.channel_closed("again").is_empty());

        let actions = session.reconnect_due();
        assert_eq!(actions, vec![SessionAction::OpenChannel]);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn drop_without_auto_reconnect_disconnects() {
        let config = SessionConfig { auto_reconnect: false, ..SessionConfig::default() };
        let mut session = Session::new(config);
        session.connect("tok".to_string()).unwrap();
        session.channel_opened().unwrap();
        session.authenticated("u1".to_string(), "ada".to_string()).unwrap();

        let actions = session.channel_closed("gone");
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(matches!(
            actions[0],
            SessionAction::Notify(SessionNotice::ConnectionLost { reconnecting: false, .. })
        ));
    }

    #[test]
    fn disconnect_wins_over_pending_reconnect() {
        let mut session = live_session();
        session.channel_closed("reset by peer");
        assert_eq!(session.state(), SessionState::Reconnecting);

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);

        // The timer still fires, but the attempt is cancelled.
        assert!(session.reconnect_due().is_empty());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut session = live_session();
        assert_eq!(session.disconnect(), vec![SessionAction::CloseChannel]);
        assert!(session.disconnect().is_empty());
    }

    #[test]
    fn drop_during_authentication_disconnects() {
        let mut session = Session::new(SessionConfig::default());
        session.connect("tok".to_string()).unwrap();
        session.channel_opened().unwrap();

        let actions = session.channel_closed("handshake failed");
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(matches!(
            actions[0],
            SessionAction::Notify(SessionNotice::ConnectionLost { reconnecting: false, .. })
        ));
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut session = Session::new(SessionConfig::default());

        assert!(matches!(
            session.channel_opened(),
            Err(SessionError::InvalidState { operation: "channel_opened", .. })
        ));
        assert!(matches!(
            session.authenticated("u1".to_string(), "ada".to_string()),
            Err(SessionError::InvalidState { operation: "authenticated", .. })
        ));

        session.connect("tok".to_string()).unwrap();
        assert!(matches!(
            session.connect("tok".to_string()),
            Err(SessionError::InvalidState { operation: "connect", .. })
        ));
    }
}

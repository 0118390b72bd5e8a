//! Action-based client state machine.
//!
//! [`Client`] composes the three pure cores — session lifecycle, state
//! reconciler, command dispatcher — behind one `handle` entry point. The
//! driver feeds it events and executes the actions it returns; the machine
//! itself performs no I/O and stores no clock.

use std::time::{Duration, Instant};

use confab_core::error::{ChatError, SessionError};
use confab_core::reconcile::{Reconciler, StateChange};
use confab_core::session::{Session, SessionAction, SessionConfig, SessionNotice, SessionState};
use confab_proto::event::ServerEvent;

use crate::dispatch::{Intent, command_for};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session lifecycle configuration.
    pub session: SessionConfig,
    /// How long a staged optimistic change may wait for confirmation before
    /// it is rolled back.
    pub optimistic_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { session: SessionConfig::default(), optimistic_window: Duration::from_secs(10) }
    }
}

/// Inputs to the client machine.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The driver established the event channel.
    ChannelOpened,

    /// The channel closed or failed to establish.
    ChannelClosed {
        /// Transport-level reason.
        reason: String,
    },

    /// A decoded event arrived on the channel.
    EventReceived(ServerEvent),

    /// The scheduled reconnect delay elapsed.
    ReconnectDue,

    /// Periodic tick; drives optimistic-expiry rollback.
    Tick,

    /// A user intent from the frontend.
    Intent(Intent),
}

/// Effects for the driver to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Establish the persistent event channel.
    OpenChannel,

    /// Tear the channel down if one is open.
    CloseChannel,

    /// Encode and transmit this command.
    Send(confab_proto::ClientCommand),

    /// Arm the one-shot reconnect timer, then feed [`ClientEvent::ReconnectDue`].
    ScheduleReconnect {
        /// Delay before the attempt.
        delay: Duration,
    },

    /// Surface this notification to the renderer.
    Publish(Notification),
}

/// Notifications surfaced to the renderer.
///
/// State notifications carry keys, not data: the renderer re-reads the
/// reconciler views through [`Client::reconciler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Connectivity changed.
    Connection(SessionNotice),

    /// Local room/message/member state changed.
    State(StateChange),

    /// A local failure (validation, staging) that never reached the wire.
    Failure(ChatError),
}

/// The composed client machine.
#[derive(Debug, Clone)]
pub struct Client {
    session: Session,
    reconciler: Reconciler,
    config: ClientConfig,
}

impl Client {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            session: Session::new(config.session.clone()),
            reconciler: Reconciler::new(),
            config,
        }
    }

    /// Session state, for renderers.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Authenticated user id, once live.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.user_id()
    }

    /// Read access to the reconciled room/message/member state.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Begin connecting with this token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is disconnected.
    pub fn connect(&mut self, token: String) -> Result<Vec<ClientAction>, SessionError> {
        Ok(map_session_actions(self.session.connect(token)?))
    }

    /// Close the session; idempotent.
    pub fn disconnect(&mut self) -> Vec<ClientAction> {
        map_session_actions(self.session.disconnect())
    }

    /// Process one event and return the actions to execute.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` only for driver bugs (e.g. reporting
    /// `ChannelOpened` while disconnected); runtime failures are returned as
    /// [`ClientAction::Publish`] actions instead.
    pub fn handle(
        &mut self,
        event: ClientEvent,
        now: Instant,
    ) -> Result<Vec<ClientAction>, SessionError> {
        match event {
            ClientEvent::ChannelOpened => {
                Ok(map_session_actions(self.session.channel_opened()?))
            },

            ClientEvent::ChannelClosed { reason } => {
                Ok(map_session_actions(self.session.channel_closed(&reason)))
            },

            ClientEvent::ReconnectDue => Ok(map_session_actions(self.session.reconnect_due())),

            ClientEvent::Tick => {
                let changes = self.reconciler.expire_pending(now, self.config.optimistic_window);
                Ok(publish_changes(changes))
            },

            ClientEvent::EventReceived(event) => self.handle_server_event(event),

            ClientEvent::Intent(intent) => Ok(self.handle_intent(intent, now)),
        }
    }

    fn handle_server_event(
        &mut self,
        event: ServerEvent,
    ) -> Result<Vec<ClientAction>, SessionError> {
        let mut actions = Vec::new();

        if let ServerEvent::Authenticated { user_id, username } = &event {
            if self.session.state() == SessionState::Authenticating {
                actions.extend(map_session_actions(
                    self.session.authenticated(user_id.clone(), username.clone())?,
                ));
            } else {
                tracing::debug!(state = ?self.session.state(), "redundant Authenticated event");
            }
        }

        // Every inbound event reaches the reconciler exactly once, in
        // arrival order; session-level events fall out as no-ops there.
        actions.extend(publish_changes(self.reconciler.apply(event)));
        Ok(actions)
    }

    fn handle_intent(&mut self, intent: Intent, now: Instant) -> Vec<ClientAction> {
        // Edits and deletes are staged optimistically once validation has
        // passed; everything else is a straight translate-and-send.
        let optimistic = match &intent {
            Intent::EditMessage { room_id, message_id, new_content } => Some((
                room_id.clone(),
                message_id.clone(),
                Some(new_content.trim().to_string()),
            )),
            Intent::DeleteMessage { room_id, message_id } => {
                Some((room_id.clone(), message_id.clone(), None))
            },
            _ => None,
        };

        let command = match command_for(intent, self.session.user_id()) {
            Ok(command) => command,
            Err(error) => {
                return vec![ClientAction::Publish(Notification::Failure(error))];
            },
        };

        let mut actions = Vec::new();
        if let Some((room_id, message_id, edit)) = optimistic {
            let staged = match edit {
                Some(new_content) => {
                    self.reconciler.stage_edit(&room_id, &message_id, new_content, now)
                },
                None => self.reconciler.stage_delete(&room_id, &message_id, now),
            };
            match staged {
                Ok(changes) => actions.extend(publish_changes(changes)),
                Err(error) => {
                    // Nothing staged; do not contact the server either.
                    return vec![ClientAction::Publish(Notification::Failure(error))];
                },
            }
        }

        actions.extend(map_session_actions(self.session.send(command)));
        actions
    }
}

fn map_session_actions(actions: Vec<SessionAction>) -> Vec<ClientAction> {
    actions
        .into_iter()
        .map(|action| match action {
            SessionAction::OpenChannel => ClientAction::OpenChannel,
            SessionAction::CloseChannel => ClientAction::CloseChannel,
            SessionAction::Transmit(command) => ClientAction::Send(command),
            SessionAction::ScheduleReconnect { delay } => ClientAction::ScheduleReconnect { delay },
            SessionAction::Notify(notice) => {
                ClientAction::Publish(Notification::Connection(notice))
            },
        })
        .collect()
}

fn publish_changes(changes: Vec<StateChange>) -> Vec<ClientAction> {
    changes.into_iter().map(|c| ClientAction::Publish(Notification::State(c))).collect()
}

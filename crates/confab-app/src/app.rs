//! Application state machine.
//!
//! [`App`] owns the client machine and folds its notifications into
//! renderable state: a status line and an error feed. Input lines are
//! parsed into commands, resolved against the focused room, and dispatched
//! as intents; everything else the frontend renders it reads back through
//! [`App::client`].

use std::time::{Duration, Instant};

use confab_client::client::{Client, ClientAction, ClientConfig, ClientEvent, Notification};
use confab_client::dispatch::Intent;
use confab_core::reconcile::StateChange;
use confab_core::session::SessionNotice;
use confab_proto::command::ClientCommand;

use crate::commands::{self, Command};
use crate::driver::DriverEvent;

/// Actions produced by the app for the runtime to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the application state.
    Render,

    /// Quit the application.
    Quit,

    /// Establish the persistent event channel.
    OpenChannel,

    /// Tear the channel down.
    CloseChannel,

    /// Transmit this command.
    Send(ClientCommand),

    /// Arm the one-shot reconnect timer.
    ScheduleReconnect {
        /// Delay before the attempt.
        delay: Duration,
    },
}

/// Application state: the client machine plus presentation scraps.
#[derive(Debug)]
pub struct App {
    client: Client,
    token: String,
    status: String,
    errors: Vec<String>,
}

impl App {
    /// Create an app that will authenticate with `token`.
    pub fn new(config: ClientConfig, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            token: token.into(),
            status: "disconnected".to_string(),
            errors: Vec::new(),
        }
    }

    /// The client machine, for rendering room/message/member state.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Current status line.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Errors surfaced so far, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Begin connecting. Called once by the runtime before the event loop.
    pub fn start(&mut self) -> Vec<AppAction> {
        self.status = "connecting".to_string();
        match self.client.connect(self.token.clone()) {
            Ok(actions) => {
                let mut mapped = self.map_actions(actions);
                mapped.push(AppAction::Render);
                mapped
            },
            Err(error) => {
                tracing::warn!(%error, "connect rejected");
                vec![AppAction::Render]
            },
        }
    }

    /// Process one driver event and return the actions to execute.
    pub fn handle(&mut self, event: DriverEvent, now: Instant) -> Vec<AppAction> {
        match event {
            DriverEvent::Input(line) => self.handle_input(&line, now),
            DriverEvent::ChannelUp => self.feed(ClientEvent::ChannelOpened, now),
            DriverEvent::ChannelDown { reason } => {
                self.feed(ClientEvent::ChannelClosed { reason }, now)
            },
            DriverEvent::Event(event) => self.feed(ClientEvent::EventReceived(event), now),
            DriverEvent::ReconnectDue => self.feed(ClientEvent::ReconnectDue, now),
            DriverEvent::Tick => self.feed(ClientEvent::Tick, now),
        }
    }

    fn handle_input(&mut self, line: &str, now: Instant) -> Vec<AppAction> {
        let focused = self.client.reconciler().focused_room().map(str::to_string);

        let intent = match commands::parse(line) {
            Command::Quit => {
                let disconnect = self.client.disconnect();
                let mut actions = self.map_actions(disconnect);
                self.status = "disconnected".to_string();
                actions.push(AppAction::Render);
                actions.push(AppAction::Quit);
                return actions;
            },
            Command::CreateRoom { name, desc } => Intent::CreateRoom { name, desc },
            Command::ListRooms => Intent::ListRooms,
            Command::JoinRoom { room_id } => Intent::JoinRoom { room_id },
            Command::Presence { presence } => Intent::SetPresence { presence },
            Command::Unknown { input } => {
                return self.reject(format!("unknown command: {input}"));
            },
            Command::InvalidArgs { command, error } => {
                return self.reject(format!("/{command}: {error}"));
            },
            focused_command => {
                // Everything else targets the focused room.
                let Some(room_id) = focused else {
                    return self.reject("no room is focused".to_string());
                };
                match focused_command {
                    Command::Message { content } => Intent::SendMessage { room_id, content },
                    Command::LeaveFocusedRoom => Intent::LeaveRoom { room_id },
                    Command::History { limit, offset } => {
                        Intent::FetchHistory { room_id, limit, offset }
                    },
                    Command::Members => Intent::FetchMembers { room_id },
                    Command::Edit { message_id, new_content } => {
                        Intent::EditMessage { room_id, message_id, new_content }
                    },
                    Command::Delete { message_id } => Intent::DeleteMessage { room_id, message_id },
                    _ => return vec![AppAction::Render],
                }
            },
        };

        self.feed(ClientEvent::Intent(intent), now)
    }

    fn feed(&mut self, event: ClientEvent, now: Instant) -> Vec<AppAction> {
        match self.client.handle(event, now) {
            Ok(actions) => {
                let mut mapped = self.map_actions(actions);
                mapped.push(AppAction::Render);
                mapped
            },
            Err(error) => {
                tracing::error!(%error, "client machine rejected event");
                vec![AppAction::Render]
            },
        }
    }

    fn reject(&mut self, error: String) -> Vec<AppAction> {
        self.errors.push(error);
        vec![AppAction::Render]
    }

    fn map_actions(&mut self, actions: Vec<ClientAction>) -> Vec<AppAction> {
        let mut mapped = Vec::new();
        for action in actions {
            match action {
                ClientAction::OpenChannel => mapped.push(AppAction::OpenChannel),
                ClientAction::CloseChannel => mapped.push(AppAction::CloseChannel),
                ClientAction::Send(command) => mapped.push(AppAction::Send(command)),
                ClientAction::ScheduleReconnect { delay } => {
                    mapped.push(AppAction::ScheduleReconnect { delay });
                },
                ClientAction::Publish(notification) => self.absorb(notification),
            }
        }
        mapped
    }

    /// Fold a notification into the status line and error feed.
    fn absorb(&mut self, notification: Notification) {
        match notification {
            Notification::Connection(SessionNotice::Live { username, .. }) => {
                self.status = format!("connected as {username}");
            },
            Notification::Connection(SessionNotice::ConnectionLost { reason, reconnecting }) => {
                self.status = if reconnecting {
                    "connection lost; reconnecting".to_string()
                } else {
                    "disconnected".to_string()
                };
                self.errors.push(format!("connection lost: {reason}"));
            },
            Notification::State(StateChange::ServerError { message }) => {
                self.errors.push(message);
            },
            Notification::State(StateChange::OptimisticExpired { message_id, .. }) => {
                self.errors.push(format!("change to {message_id} was not confirmed; rolled back"));
            },
            Notification::Failure(error) => self.errors.push(error.to_string()),
            Notification::State(_) => {},
        }
    }
}

//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific input, channel transport, and rendering, while the
//! generic [`crate::Runtime`] handles all orchestration.

use std::future::Future;
use std::time::{Duration, Instant};

use confab_proto::command::ClientCommand;
use confab_proto::event::ServerEvent;

use crate::app::App;

/// A single multiplexed occurrence delivered to the runtime.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A line of user input.
    Input(String),

    /// The event channel came up.
    ///
    /// Synthesized by the runtime after [`Driver::open_channel`] succeeds;
    /// drivers do not emit it themselves.
    ChannelUp,

    /// The event channel went down or failed to establish.
    ChannelDown {
        /// Transport-level reason.
        reason: String,
    },

    /// A decoded event arrived on the channel.
    Event(ServerEvent),

    /// The reconnect timer armed via [`Driver::schedule_reconnect`] elapsed.
    ReconnectDue,

    /// Periodic tick; drives optimistic-expiry rollback.
    Tick,
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`crate::Runtime`] handles orchestration logic; the same orchestration
/// code runs in production frontends and in simulation.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next occurrence: user input, a channel event, channel
    /// loss, or a timer.
    fn next_event(&mut self) -> impl Future<Output = Result<DriverEvent, Self::Error>> + Send;

    /// Establish the persistent event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be established; the runtime
    /// feeds it back as [`DriverEvent::ChannelDown`].
    fn open_channel(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Tear the channel down if one is open.
    fn close_channel(&mut self) -> impl Future<Output = ()> + Send;

    /// Encode and transmit one command over the channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the send fails.
    fn send_command(
        &mut self,
        command: ClientCommand,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Arm the one-shot reconnect timer.
    fn schedule_reconnect(&mut self, delay: Duration);

    /// Current time instant. Virtual in simulation.
    fn now(&self) -> Instant;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Stop the connection and clean up resources.
    fn stop(&mut self);
}

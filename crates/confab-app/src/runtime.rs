//! Generic orchestration loop.
//!
//! [`Runtime`] drives an [`App`] against a [`Driver`]: wait for the next
//! driver event, hand it to the app, execute the resulting actions. Action
//! execution can itself produce follow-up events (a failed channel open
//! becomes `ChannelDown`), so actions drain through a work queue rather
//! than recursion. The loop is the session's single logical thread: all
//! state mutation happens here, in arrival order.

use std::collections::VecDeque;

use crate::app::{App, AppAction};
use crate::driver::{Driver, DriverEvent};

/// Generic runtime orchestrating an [`App`] over a [`Driver`].
pub struct Runtime<D: Driver> {
    driver: D,
    app: App,
}

impl<D: Driver> Runtime<D> {
    /// Create a runtime.
    pub fn new(driver: D, app: App) -> Self {
        Self { driver, app }
    }

    /// Run until the app quits or the driver fails.
    ///
    /// Returns the final application state for inspection.
    ///
    /// # Errors
    ///
    /// Propagates driver errors from polling and rendering.
    pub async fn run(mut self) -> Result<App, D::Error> {
        let start_actions = self.app.start();
        let mut quit = self.drain(start_actions).await?;

        while !quit {
            let event = self.driver.next_event().await?;
            let now = self.driver.now();
            let actions = self.app.handle(event, now);
            quit = self.drain(actions).await?;
        }

        self.driver.stop();
        Ok(self.app)
    }

    /// Execute actions in order, feeding follow-up events back to the app.
    async fn drain(&mut self, actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut queue: VecDeque<AppAction> = actions.into();
        let mut quit = false;

        while let Some(action) = queue.pop_front() {
            match action {
                AppAction::Render => self.driver.render(&self.app)?,
                AppAction::Quit => quit = true,
                AppAction::OpenChannel => {
                    let follow_up = match self.driver.open_channel().await {
                        Ok(()) => DriverEvent::ChannelUp,
                        Err(error) => DriverEvent::ChannelDown { reason: error.to_string() },
                    };
                    let now = self.driver.now();
                    queue.extend(self.app.handle(follow_up, now));
                },
                AppAction::CloseChannel => self.driver.close_channel().await,
                AppAction::Send(command) => {
                    if let Err(error) = self.driver.send_command(command).await {
                        let now = self.driver.now();
                        queue.extend(self.app.handle(
                            DriverEvent::ChannelDown { reason: error.to_string() },
                            now,
                        ));
                    }
                },
                AppAction::ScheduleReconnect { delay } => self.driver.schedule_reconnect(delay),
            }
        }

        Ok(quit)
    }
}

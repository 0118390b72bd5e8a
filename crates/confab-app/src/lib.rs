//! Application layer for Confab.
//!
//! A thin, frontend-agnostic shell over the client machine: it parses
//! command strings into intents, folds notifications into a status line and
//! error feed, and runs the orchestration loop against a platform
//! [`Driver`]. Rendering itself stays outside this crate — a frontend
//! implements [`Driver`] and reads state back through [`App`].
//!
//! # Components
//!
//! - [`App`]: application state (client machine, status, errors)
//! - [`commands`]: slash-command parsing
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: generic orchestration loop using `Driver`

pub mod app;
pub mod commands;
pub mod driver;
pub mod runtime;

pub use app::{App, AppAction};
pub use commands::Command;
pub use driver::{Driver, DriverEvent};
pub use runtime::Runtime;

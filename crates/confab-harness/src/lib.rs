//! Deterministic simulation harness for Confab client testing.
//!
//! Drives the sans-I/O client machines directly — no sockets, no runtime —
//! with a scripted in-memory chat service and virtual time. Scenarios are
//! declarative and end in a mandatory oracle that verifies global state, so
//! a scenario cannot be written without its assertion.

pub mod scenario;
pub mod script;

pub use scenario::{OracleFn, RunnableScenario, Scenario, World};
pub use script::ScriptedServer;

//! Command Handlers module
//!
//! Handlers that coordinate the event log and the author aggregate store.
//! Each write path runs in a single SQLite transaction.

mod admin_handler;
mod commands;
mod event_handler;

#[cfg(test)]
mod tests;

pub use admin_handler::{AdminError, AdminHandler};
pub use commands::*;
pub use event_handler::{EventHandler, ProcessError};

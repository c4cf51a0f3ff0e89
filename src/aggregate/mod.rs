//! Aggregate module
//!
//! Derived per-author state folded from the event log.

pub mod author;

pub use author::AuthorAggregate;

//! Domain module
//!
//! Event records, validation rules and domain errors.

pub mod error;
pub mod events;

pub use error::MalformedEvent;
pub use events::{NewEvent, RawEvent, StoredEvent, ValidationPolicy};

//! API module
//!
//! Read-only HTTP reporting endpoints and middleware.

pub mod middleware;
pub mod routes;

pub use routes::create_router;

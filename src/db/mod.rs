//! Database module for downtrack.
//!
//! Provides SQLite storage for events, test samples and the service registry.

mod models;
mod store;

pub use models::*;
pub use store::*;

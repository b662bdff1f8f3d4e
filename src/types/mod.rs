//! Core types shared across the gateway.
//!
//! - **IDs**: Strongly-typed identifiers (JobId)
//! - **Errors**: Application error types with thiserror derives

mod errors;
mod ids;

pub use errors::{Error, Result};
pub use ids::JobId;

//! FieldOps Core - shared foundations for the FieldOps backend
//!
//! Defines the access-control error taxonomy used across the workspace and
//! the logging initialization helpers.

pub mod error;
pub mod logging;

pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;

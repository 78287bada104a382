/// Core Module for flightdeck
///
/// Shared infrastructure for the database access layer: the pooled
/// connection provider, the fixed-query executor and the error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{FlightsError, Result};

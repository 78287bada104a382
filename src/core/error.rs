/// Flightdeck Error Module
///
/// This module defines the error types shared by the database layer, the
/// configuration loader and the CLI front end.
use thiserror::Error;

/// Error type for every fallible flightdeck operation.
///
/// Covers:
/// - Backing store connectivity (direct probe, pool checkout)
/// - Per-query execution failures, tagged with the operation name
/// - Configuration and data-source resolution
/// - Output rendering (CSV, JSON) and file system access
#[derive(Error, Debug)]
pub enum FlightsError {
    /// Raw SQLite errors outside a named query
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Pool checkout failures (timeout waiting for a free handle)
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A fixed query failed while executing or shaping its rows
    #[error("Query error in {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The backing store stayed unreachable for every probe attempt
    #[error("Data source '{dsn}' unreachable after {attempts} attempt(s): {source}")]
    Unreachable {
        dsn: String,
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// DSN not present in the data-source registry
    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Subscriber installation failures
    #[error("Logging error: {0}")]
    Logging(String),

    /// Output rendering errors
    #[error("UI error: {0}")]
    Ui(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Type alias for Result to use FlightsError as the error type.
pub type Result<T> = std::result::Result<T, FlightsError>;

// Core infrastructure modules
pub mod core;

// Ambient modules
pub mod config;
pub mod logging;

// Front end
pub mod cli;
pub mod grid;

// Shared fixtures for unit, integration and property tests
pub mod test_utils;

pub use cli::run;

/// # Test Utilities Module
///
/// Fixtures for building a flights database on disk, shared by unit tests,
/// integration tests and the property tests.
///
/// This module provides:
/// - The `usflightsjan1wk` schema as used by the queries
/// - Row builders with realistic defaults
/// - Error assertion helpers for `FlightsError`

use crate::core::{FlightsError, Result};
use rusqlite::{params, Connection};
use std::path::Path;

/// Schema of the flights table, limited to the columns the queries read.
pub const FLIGHTS_SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS usflightsjan1wk (
        FlightDate TEXT NOT NULL,
        Airline TEXT NOT NULL,
        Dep_CityName TEXT,
        Arr_CityName TEXT,
        DepTime_label TEXT,
        Flight_Duration INTEGER,
        Distance_type TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_route ON usflightsjan1wk (Dep_CityName, Arr_CityName);
";

/// One row of the flights table.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRow {
    pub airline: String,
    pub departure_city: String,
    pub arrival_city: String,
    pub flight_date: String,
    pub departure_time_label: String,
    pub duration_minutes: i64,
    pub distance_type: String,
}

impl FlightRow {
    /// Row with default departure label, duration and distance bucket.
    pub fn new(airline: &str, departure_city: &str, arrival_city: &str, flight_date: &str) -> Self {
        FlightRow {
            airline: airline.to_string(),
            departure_city: departure_city.to_string(),
            arrival_city: arrival_city.to_string(),
            flight_date: flight_date.to_string(),
            departure_time_label: "Morning".to_string(),
            duration_minutes: 120,
            distance_type: "Short Haul >1500Mi".to_string(),
        }
    }

    pub fn with_departure_time_label(mut self, label: &str) -> Self {
        self.departure_time_label = label.to_string();
        self
    }

    pub fn with_duration(mut self, minutes: i64) -> Self {
        self.duration_minutes = minutes;
        self
    }
}

/// A flights database file populated for a test.
pub struct FlightsFixture;

impl FlightsFixture {
    /// Creates (or extends) the database at `path` with the given rows.
    ///
    /// Uses its own writable connection and closes it before returning, so the
    /// file can then be opened read-only by the pool.
    pub fn create(path: &Path, rows: &[FlightRow]) -> Result<()> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch(FLIGHTS_SCHEMA_SQL)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO usflightsjan1wk
                 (FlightDate, Airline, Dep_CityName, Arr_CityName, DepTime_label, Flight_Duration, Distance_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.flight_date,
                    row.airline,
                    row.departure_city,
                    row.arrival_city,
                    row.departure_time_label,
                    row.duration_minutes,
                    row.distance_type,
                ])?;
            }
        }
        tx.commit()?;
        conn.close().map_err(|(_, e)| FlightsError::Database(e))?;
        Ok(())
    }

    /// A small realistic week of flights between four cities.
    pub fn sample_rows() -> Vec<FlightRow> {
        vec![
            FlightRow::new("Delta Air Lines Inc", "Atlanta, GA", "Chicago, IL", "2024-01-01"),
            FlightRow::new("Delta Air Lines Inc", "Atlanta, GA", "Chicago, IL", "2024-01-01")
                .with_departure_time_label("Evening")
                .with_duration(115),
            FlightRow::new("United Air Lines Inc", "Chicago, IL", "Denver, CO", "2024-01-02")
                .with_duration(150),
            FlightRow::new("Southwest Airlines Co", "Denver, CO", "Atlanta, GA", "2024-01-02")
                .with_departure_time_label("Afternoon")
                .with_duration(180),
            FlightRow::new("Delta Air Lines Inc", "Atlanta, GA", "Boston, MA", "2024-01-03")
                .with_duration(140),
        ]
    }
}

/// Error testing utilities specific to FlightsError patterns
pub mod error_testing {
    /// Assert that an error's message contains a fragment (case-insensitive).
    pub fn assert_error_message_contains<T, E>(
        result: &std::result::Result<T, E>,
        expected_message_fragment: &str,
        context: &str,
    ) where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => panic!("Expected FlightsError but got Ok in {}", context),
            Err(e) => {
                let error_str = e.to_string();
                assert!(
                    error_str
                        .to_lowercase()
                        .contains(&expected_message_fragment.to_lowercase()),
                    "Expected '{}' in error message '{}' context: {}",
                    expected_message_fragment,
                    error_str,
                    context
                );
            }
        }
    }
}

#[macro_export]
macro_rules! assert_flights_error {
    ($result:expr, $expected:pat, $context:expr) => {
        match $result {
            Err($expected) => {}
            Ok(_) => panic!("Expected {} but got Ok in {}", stringify!($expected), $context),
            Err(other) => panic!(
                "Expected {} but got {:?} in {}",
                stringify!($expected),
                other,
                $context
            ),
        }
    };
}

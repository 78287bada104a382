/// Query Execution Module
///
/// The five fixed, read-only flight queries and the shaping of their rows into
/// column-oriented results. Every query runs on one pooled connection borrowed
/// from the [`ConnectionProvider`].

use crate::core::db::connection::ConnectionProvider;
use crate::core::{FlightsError, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, error};

const CITY_NAMES_SQL: &str = "
    SELECT DISTINCT Dep_CityName FROM usflightsjan1wk
    UNION
    SELECT DISTINCT Arr_CityName FROM usflightsjan1wk";

const FLIGHTS_SQL: &str = "
    SELECT Airline, DepTime_label, Flight_Duration, Distance_type
    FROM usflightsjan1wk
    WHERE Dep_CityName = ?1 AND Arr_CityName = ?2";

const AIRLINE_FREQUENCY_SQL: &str = "
    SELECT Airline, COUNT(*)
    FROM usflightsjan1wk
    GROUP BY Airline
    ORDER BY Airline";

const BUSY_AIRPORTS_SQL: &str = "
    SELECT t.Dep_CityName, COUNT(*)
    FROM (SELECT Dep_CityName FROM usflightsjan1wk
          UNION ALL
          SELECT Arr_CityName FROM usflightsjan1wk) t
    WHERE t.Dep_CityName IS NOT NULL
    GROUP BY t.Dep_CityName
    ORDER BY COUNT(*) DESC";

const DAILY_FREQUENCY_SQL: &str = "
    SELECT FlightDate, COUNT(*)
    FROM usflightsjan1wk
    GROUP BY FlightDate
    ORDER BY FlightDate";

/// One row of the flight search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightRecord {
    pub airline: String,
    /// Departure time bucket, e.g. "Morning"
    pub departure_time_label: String,
    pub duration: String,
    /// Distance bucket, e.g. "Short Haul >1500Mi"
    pub distance_type: String,
}

/// Grouped counts as two parallel columns, ready for a chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frequency {
    pub labels: Vec<String>,
    pub counts: Vec<i64>,
}

impl Frequency {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }

    /// Iterates `(label, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.counts.iter().copied())
    }

    fn push(&mut self, label: String, count: i64) {
        self.labels.push(label);
        self.counts.push(count);
    }
}

/// Converts a failed query into an empty result.
///
/// The executor has already logged the failure, so this only decides what the
/// caller sees: nothing, the same as a query that matched no rows.
pub trait FailSoft<T> {
    fn or_empty(self) -> T;
}

impl<T: Default> FailSoft<T> for Result<T> {
    fn or_empty(self) -> T {
        self.unwrap_or_default()
    }
}

/// Runs the fixed flight queries against a pooled data source.
pub struct QueryExecutor<'a> {
    provider: &'a ConnectionProvider,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor borrowing the given provider
    pub fn new(provider: &'a ConnectionProvider) -> Self {
        QueryExecutor { provider }
    }

    /// Every distinct departure or arrival city.
    pub fn list_city_names(&self) -> Result<BTreeSet<String>> {
        self.run("list_city_names", CITY_NAMES_SQL, &[], |conn| {
            let mut stmt = conn.prepare_cached(CITY_NAMES_SQL)?;
            let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;
            let mut cities = BTreeSet::new();
            for city in rows {
                if let Some(city) = city? {
                    cities.insert(city);
                }
            }
            Ok(cities)
        })
    }

    /// Flights departing `departure` and arriving at `arrival` (exact match).
    ///
    /// No match is an empty vector, not an error.
    pub fn list_flights(&self, departure: &str, arrival: &str) -> Result<Vec<FlightRecord>> {
        self.run("list_flights", FLIGHTS_SQL, &[departure, arrival], |conn| {
            let mut stmt = conn.prepare_cached(FLIGHTS_SQL)?;
            let flights = stmt
                .query_map([departure, arrival], map_flight)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(flights)
        })
    }

    /// Number of flights per airline.
    pub fn airline_frequency(&self) -> Result<Frequency> {
        self.frequency("airline_frequency", AIRLINE_FREQUENCY_SQL)
    }

    /// Departures plus arrivals per city, busiest first.
    pub fn busy_airports(&self) -> Result<Frequency> {
        self.frequency("busy_airports", BUSY_AIRPORTS_SQL)
    }

    /// Number of flights per flight date.
    pub fn daily_frequency(&self) -> Result<Frequency> {
        self.frequency("daily_frequency", DAILY_FREQUENCY_SQL)
    }

    fn frequency(&self, operation: &'static str, sql: &'static str) -> Result<Frequency> {
        self.run(operation, sql, &[], |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let mut rows = stmt.query([])?;
            let mut out = Frequency::default();
            while let Some(row) = rows.next()? {
                out.push(format_value(row.get_ref(0)?), row.get(1)?);
            }
            Ok(out)
        })
    }

    /// Runs `body` on a pooled connection, tagging and logging any failure
    /// with the operation, SQL text and parameters.
    fn run<T, F>(
        &self,
        operation: &'static str,
        sql: &'static str,
        params: &[&str],
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let started = Instant::now();
        let result = self.provider.with_connection(|conn| {
            body(conn).map_err(|source| FlightsError::Query { operation, source })
        });

        match &result {
            Ok(_) => debug!(
                operation,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "query completed"
            ),
            Err(err) => error!(
                operation,
                sql = sql.trim(),
                params = ?params,
                error = %err,
                "query failed"
            ),
        }
        result
    }
}

fn map_flight(row: &Row) -> rusqlite::Result<FlightRecord> {
    Ok(FlightRecord {
        airline: format_value(row.get_ref(0)?),
        departure_time_label: format_value(row.get_ref(1)?),
        duration: format_value(row.get_ref(2)?),
        distance_type: format_value(row.get_ref(3)?),
    })
}

/// Renders a SQLite value as text, whatever its storage class.
fn format_value(value: ValueRef) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}

/// Connection Management Module
///
/// Owns the pooled engine (an r2d2 pool of read-only SQLite connections),
/// validates that the backing store is reachable at startup, and lends one
/// pooled connection per query through [`ConnectionProvider::with_connection`].

use crate::core::db::retry::RetryPolicy;
use crate::core::{FlightsError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Default upper bound on pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 20;

/// Default wait for a free connection before checkout fails.
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default age after which a pooled connection is recycled.
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// Busy timeout applied to every connection the pool opens.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Sizing and recycling settings for the pooled engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Hard bound on open connections; the pool never overflows it
    pub max_size: u32,
    /// How long `with_connection` waits for a free handle
    pub checkout_timeout: Duration,
    /// Connections older than this are closed instead of reused
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_size: DEFAULT_POOL_SIZE,
            checkout_timeout: DEFAULT_CHECKOUT_TIMEOUT,
            max_lifetime: DEFAULT_MAX_LIFETIME,
        }
    }
}

impl PoolSettings {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(FlightsError::Config(
                "pool max_size must be greater than 0".to_string(),
            ));
        }
        if self.checkout_timeout.is_zero() {
            return Err(FlightsError::Config(
                "pool checkout timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A data source resolved to the SQLite file backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Name used in logs and errors (the DSN, or the path for direct URLs)
    pub name: String,
    pub path: PathBuf,
}

impl ResolvedSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        ResolvedSource {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_size: u32,
    /// Connections currently open (idle or checked out)
    pub connections: u32,
    pub idle: u32,
    /// Connections currently lent out to a query
    pub in_use: u32,
}

/// Routes r2d2's background connection errors into tracing.
#[derive(Debug)]
struct TracingErrorHandler;

impl r2d2::HandleError<rusqlite::Error> for TracingErrorHandler {
    fn handle_error(&self, err: rusqlite::Error) {
        error!(target: "flightdeck::pool", error = %err, "pooled connection error");
    }
}

fn open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI
}

/// Opens one connection outside the pool and runs a trivial statement.
///
/// Opening alone is not enough: SQLite defers reading the header until the
/// schema is first touched, so a non-database file only fails on the query.
fn probe(path: &Path) -> rusqlite::Result<()> {
    let conn = Connection::open_with_flags(path, open_flags())?;
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

/// Connection provider owning the pooled engine.
///
/// Create one at startup with [`ConnectionProvider::initialize`], pass it by
/// reference to whoever runs queries, and dispose of it with
/// [`ConnectionProvider::close`] (or by dropping it). The provider is not
/// `Clone`: it is the single owner of the pool, so closing it closes every
/// idle connection. Share it across threads by reference.
pub struct ConnectionProvider {
    source: ResolvedSource,
    pool: Pool<SqliteConnectionManager>,
}

impl fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("source", &self.source)
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionProvider {
    /// Builds the pooled engine and validates that the backing store answers.
    ///
    /// The pool is created lazily: no connection is opened until the first
    /// checkout. Reachability is checked with a direct connection retried
    /// according to `retry`.
    ///
    /// # Errors
    ///
    /// `FlightsError::Config` for invalid pool settings,
    /// `FlightsError::Unreachable` once every probe attempt has failed.
    pub fn initialize(
        source: ResolvedSource,
        settings: &PoolSettings,
        retry: &RetryPolicy,
    ) -> Result<Self> {
        Self::initialize_with_sleep(source, settings, retry, std::thread::sleep)
    }

    /// [`ConnectionProvider::initialize`] with an injectable sleep between probes.
    pub fn initialize_with_sleep<S>(
        source: ResolvedSource,
        settings: &PoolSettings,
        retry: &RetryPolicy,
        sleep: S,
    ) -> Result<Self>
    where
        S: FnMut(Duration),
    {
        settings.validate()?;

        let manager = SqliteConnectionManager::file(&source.path)
            .with_flags(open_flags())
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));

        let pool = Pool::builder()
            .max_size(settings.max_size)
            .min_idle(Some(0))
            .idle_timeout(None)
            .max_lifetime(Some(settings.max_lifetime))
            .connection_timeout(settings.checkout_timeout)
            .error_handler(Box::new(TracingErrorHandler))
            .build_unchecked(manager);

        debug!(
            dsn = %source.name,
            path = %source.path.display(),
            max_size = settings.max_size,
            checkout_timeout_ms = settings.checkout_timeout.as_millis() as u64,
            max_lifetime_secs = settings.max_lifetime.as_secs(),
            "configured connection pool"
        );

        let what = format!("connection to data source '{}'", source.name);
        retry
            .run_with_sleep(&what, sleep, |_| probe(&source.path))
            .map_err(|exhausted| FlightsError::Unreachable {
                dsn: source.name.clone(),
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })?;

        info!(dsn = %source.name, "connection provider ready");
        Ok(ConnectionProvider { source, pool })
    }

    /// Runs `body` with exactly one pooled connection.
    ///
    /// The connection goes back to the pool when this returns, whether `body`
    /// succeeded, failed or panicked. Do not call `with_connection` again from
    /// inside `body`: that checks out a second handle and can exhaust a small
    /// pool.
    ///
    /// # Errors
    ///
    /// `FlightsError::Pool` if no connection frees up within the checkout
    /// timeout; otherwise whatever `body` returns.
    pub fn with_connection<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.pool.get()?;
        trace!(dsn = %self.source.name, "checked out pooled connection");
        let result = body(&*conn);
        drop(conn);
        trace!(dsn = %self.source.name, "returned pooled connection");
        result
    }

    /// Current pool occupancy.
    pub fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            max_size: self.pool.max_size(),
            connections: state.connections,
            idle: state.idle_connections,
            in_use: state.connections.saturating_sub(state.idle_connections),
        }
    }

    /// The data source this provider is connected to.
    pub fn source(&self) -> &ResolvedSource {
        &self.source
    }

    /// Disposes of the pool, closing idle connections.
    pub fn close(self) {
        let status = self.status();
        info!(
            dsn = %self.source.name,
            connections = status.connections,
            "closing connection provider"
        );
    }
}

use crate::core::db::{PoolSettings, ResolvedSource, RetryPolicy};
use crate::core::{FlightsError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the data source.
pub const DSN_ENV_VAR: &str = "DB_DSN";

/// Data source used when nothing else names one.
pub const DEFAULT_DSN: &str = "AWSMYSQL";

/// Top-level configuration structure parsed from a TOML file.
///
/// Every section is optional; missing values fall back to the defaults the
/// connection layer uses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
    /// DSN registry: data-source name to SQLite file
    pub datasources: BTreeMap<String, PathBuf>,
}

/// Which data source to connect to.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub dsn: Option<String>,
}

/// Pooled engine sizing.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: u32,
    pub checkout_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let defaults = PoolSettings::default();
        PoolConfig {
            max_size: defaults.max_size,
            checkout_timeout_secs: defaults.checkout_timeout.as_secs(),
            max_lifetime_secs: defaults.max_lifetime.as_secs(),
        }
    }
}

impl PoolConfig {
    pub fn settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.max_size,
            checkout_timeout: Duration::from_secs(self.checkout_timeout_secs),
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
        }
    }
}

/// Startup reachability retry.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        RetryConfig {
            attempts: defaults.attempts,
            delay_secs: defaults.delay.as_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_secs(self.delay_secs))
    }
}

/// Log sinks.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file, appended to
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// How a data source is named on the command line, in the environment or in
/// the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A name looked up in the `[datasources]` registry
    Named(String),
    /// A direct `sqlite://` path
    Path(PathBuf),
}

impl DataSource {
    /// Parses `NAME`, `DSN=NAME;` or `sqlite://PATH`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if let Some(path) = trimmed.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(FlightsError::Config(format!(
                    "data source '{}' has an empty path",
                    input
                )));
            }
            return Ok(DataSource::Path(PathBuf::from(path)));
        }

        // Connection strings may carry credentials, so errors never echo them.
        let mut pairs = trimmed.split(';').map(str::trim).filter(|p| !p.is_empty());
        let first = pairs.next().unwrap_or_default();
        let name = match first.split_once('=') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("DSN") => value.trim(),
            Some((key, _)) => {
                return Err(FlightsError::Config(format!(
                    "unsupported connection string key '{}': expected NAME, DSN=NAME or sqlite://PATH",
                    key.trim()
                )))
            }
            None => first,
        };
        if pairs.next().is_some() {
            return Err(FlightsError::Config(
                "connection string has attributes besides DSN; only NAME or DSN=NAME is supported"
                    .to_string(),
            ));
        }

        if name.is_empty() {
            return Err(FlightsError::Config("data source name is empty".to_string()));
        }
        Ok(DataSource::Named(name.to_string()))
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, the per-user file
    /// (`<config dir>/flightdeck/config.toml`) is used when present, and the
    /// defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => load_config(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => load_config(path),
                _ => Ok(Config::default()),
            },
        }
    }

    /// Picks the DSN: command line, then `DB_DSN`, then the config file, then
    /// `AWSMYSQL`.
    pub fn dsn(&self, cli_dsn: Option<&str>) -> String {
        let env_dsn = std::env::var(DSN_ENV_VAR).ok();
        pick_dsn(cli_dsn, env_dsn.as_deref(), self.database.dsn.as_deref())
    }

    /// Resolves a DSN string to the SQLite file behind it.
    pub fn resolve(&self, dsn: &str) -> Result<ResolvedSource> {
        match DataSource::parse(dsn)? {
            DataSource::Path(path) => Ok(ResolvedSource::new(path.display().to_string(), path)),
            DataSource::Named(name) => match self.datasources.get(&name) {
                Some(path) => Ok(ResolvedSource::new(name.clone(), path.clone())),
                None => Err(FlightsError::UnknownDataSource(name)),
            },
        }
    }
}

fn pick_dsn(cli: Option<&str>, env: Option<&str>, file: Option<&str>) -> String {
    [cli, env, file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_DSN)
        .to_string()
}

/// Per-user configuration file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("flightdeck").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        FlightsError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| FlightsError::Config(format!("invalid {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::error_testing;

    const SAMPLE_CONFIG: &str = r#"
[database]
dsn = "FLIGHTS"

[pool]
max_size = 8
checkout_timeout_secs = 10
max_lifetime_secs = 600

[retry]
attempts = 3
delay_secs = 1

[logging]
level = "debug"
file = "/var/log/flightdeck/app.log"

[datasources]
FLIGHTS = "/srv/data/flights.db"
AWSMYSQL = "/srv/data/usflights.db"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.database.dsn.as_deref(), Some("FLIGHTS"));

        let pool = config.pool.settings();
        assert_eq!(pool.max_size, 8);
        assert_eq!(pool.checkout_timeout, Duration::from_secs(10));
        assert_eq!(pool.max_lifetime, Duration::from_secs(600));

        let retry = config.retry.policy();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.delay, Duration::from_secs(1));

        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.file,
            Some(PathBuf::from("/var/log/flightdeck/app.log"))
        );
        assert_eq!(config.datasources.len(), 2);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.pool.settings(), PoolSettings::default());
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.datasources.is_empty());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[pool]\nmax_size = 4\n").unwrap();
        let pool = config.pool.settings();
        assert_eq!(pool.max_size, 4);
        assert_eq!(pool.checkout_timeout, Duration::from_secs(60));
        assert_eq!(pool.max_lifetime, Duration::from_secs(3600));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pool\nmax_size = ").unwrap();

        let result = load_config(&path);
        error_testing::assert_error_message_contains(&result, "invalid", "malformed TOML");
        crate::assert_flights_error!(result, FlightsError::Config(_), "malformed TOML");
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let result = Config::load(Some(Path::new("/nonexistent/flightdeck.toml")));
        assert!(matches!(result, Err(FlightsError::Config(_))));
    }

    #[test]
    fn test_pick_dsn_precedence() {
        assert_eq!(pick_dsn(Some("CLI"), Some("ENV"), Some("FILE")), "CLI");
        assert_eq!(pick_dsn(None, Some("ENV"), Some("FILE")), "ENV");
        assert_eq!(pick_dsn(None, None, Some("FILE")), "FILE");
        assert_eq!(pick_dsn(None, None, None), "AWSMYSQL");
        assert_eq!(pick_dsn(Some("  "), Some(""), None), "AWSMYSQL");
    }

    #[test]
    fn test_parse_data_source() {
        assert_eq!(
            DataSource::parse("AWSMYSQL").unwrap(),
            DataSource::Named("AWSMYSQL".to_string())
        );
        assert_eq!(
            DataSource::parse("DSN=AWSMYSQL;").unwrap(),
            DataSource::Named("AWSMYSQL".to_string())
        );
        assert_eq!(
            DataSource::parse("dsn = FLIGHTS").unwrap(),
            DataSource::Named("FLIGHTS".to_string())
        );
        assert_eq!(
            DataSource::parse("sqlite:///tmp/flights.db").unwrap(),
            DataSource::Path(PathBuf::from("/tmp/flights.db"))
        );
        assert!(DataSource::parse("DSN=;").is_err());
        assert!(DataSource::parse("DRIVER={ODBC Driver 17};SERVER=x").is_err());
        assert!(DataSource::parse("sqlite://").is_err());
    }

    #[test]
    fn test_parse_rejects_extra_attributes_without_echoing_them() {
        let result = DataSource::parse("DSN=AWSMYSQL;UID=admin;PWD=Admin1234");
        error_testing::assert_error_message_contains(&result, "besides DSN", "extra attributes");
        let msg = result.unwrap_err().to_string();
        assert!(!msg.contains("Admin1234"));
        assert!(!msg.contains("UID"));

        let result = DataSource::parse("AWSMYSQL;PWD=Admin1234");
        crate::assert_flights_error!(result, FlightsError::Config(_), "bare name with attributes");

        let result = DataSource::parse("DRIVER=x;PWD=Admin1234");
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("DRIVER"));
        assert!(!msg.contains("Admin1234"));

        // Trailing separators alone are still fine
        assert_eq!(
            DataSource::parse("DSN=AWSMYSQL;;").unwrap(),
            DataSource::Named("AWSMYSQL".to_string())
        );
    }

    #[test]
    fn test_resolve_data_source() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).unwrap();

        let named = config.resolve("DSN=FLIGHTS;").unwrap();
        assert_eq!(named.name, "FLIGHTS");
        assert_eq!(named.path, PathBuf::from("/srv/data/flights.db"));

        let direct = config.resolve("sqlite:///tmp/other.db").unwrap();
        assert_eq!(direct.path, PathBuf::from("/tmp/other.db"));

        let result = config.resolve("MISSING");
        error_testing::assert_error_message_contains(&result, "MISSING", "unregistered name");
        crate::assert_flights_error!(result, FlightsError::UnknownDataSource(_), "unregistered name");
    }
}

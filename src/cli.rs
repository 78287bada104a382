//! Command-line front end: parses arguments, wires configuration, logging and
//! the connection provider together, and renders query results.

use crate::config::Config;
use crate::core::db::{ConnectionProvider, FailSoft, Frequency, QueryExecutor};
use crate::core::Result;
use crate::grid::{OutputFormat, ResultsGrid};
use crate::logging;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

/// Query the US flights dataset through a pooled, retrying SQLite connection.
#[derive(Parser, Debug)]
#[command(name = "flightdeck", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to <config dir>/flightdeck/config.toml)
    #[arg(global = true, long)]
    pub config: Option<PathBuf>,

    /// Data source: NAME, DSN=NAME or sqlite://PATH (overrides DB_DSN)
    #[arg(global = true, long)]
    pub dsn: Option<String>,

    /// Output format
    #[arg(global = true, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Fail on query errors instead of printing "no data"
    #[arg(global = true, long)]
    pub strict: bool,

    /// Debug logging on the console
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Connect to the data source and print pool status
    Check,
    /// List every departure and arrival city
    Cities,
    /// List flights between two cities
    Flights {
        /// Departure city, e.g. "Atlanta, GA"
        departure: String,
        /// Arrival city, e.g. "Chicago, IL"
        arrival: String,
    },
    /// Print aggregate flight statistics
    Analytics {
        #[arg(value_enum, default_value_t = Chart::All)]
        chart: Chart,
    },
}

/// Which aggregate `analytics` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Chart {
    Airlines,
    Airports,
    Daily,
    All,
}

#[derive(Debug, Default, Serialize)]
struct Analytics {
    #[serde(skip_serializing_if = "Option::is_none")]
    airlines: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    airports: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    daily: Option<Frequency>,
}

/// Loads configuration, installs logging, connects, runs the command and
/// disposes of the pool.
pub fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose)?;

    let dsn = config.dsn(cli.dsn.as_deref());
    let source = config.resolve(&dsn)?;
    info!(dsn = %source.name, path = %source.path.display(), "starting flightdeck");

    let provider = ConnectionProvider::initialize(
        source,
        &config.pool.settings(),
        &config.retry.policy(),
    )?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = execute(cli, &provider, &mut out);
    provider.close();
    result
}

/// Runs one command against an initialized provider, writing to `out`.
pub fn execute<W: Write>(cli: &Cli, provider: &ConnectionProvider, out: &mut W) -> Result<()> {
    let executor = QueryExecutor::new(provider);
    match &cli.command {
        Commands::Check => {
            let status = provider.status();
            if cli.format == OutputFormat::Json {
                write_json(out, &status)
            } else {
                let source = provider.source();
                writeln!(out, "data source: {} ({})", source.name, source.path.display())?;
                writeln!(
                    out,
                    "pool: {} open of {} max, {} idle, {} in use",
                    status.connections, status.max_size, status.idle, status.in_use
                )?;
                Ok(())
            }
        }
        Commands::Cities => {
            let cities = settle(cli.strict, executor.list_city_names())?;
            if cli.format == OutputFormat::Json {
                write_json(out, &cities)
            } else {
                write_grid(out, cli.format, &ResultsGrid::from_cities(&cities))
            }
        }
        Commands::Flights { departure, arrival } => {
            let flights = settle(cli.strict, executor.list_flights(departure, arrival))?;
            if cli.format == OutputFormat::Json {
                write_json(out, &flights)
            } else {
                write_grid(out, cli.format, &ResultsGrid::from_flights(&flights))
            }
        }
        Commands::Analytics { chart } => {
            let wants = |c: Chart| *chart == c || *chart == Chart::All;
            let mut analytics = Analytics::default();
            if wants(Chart::Airlines) {
                analytics.airlines = Some(settle(cli.strict, executor.airline_frequency())?);
            }
            if wants(Chart::Airports) {
                analytics.airports = Some(settle(cli.strict, executor.busy_airports())?);
            }
            if wants(Chart::Daily) {
                analytics.daily = Some(settle(cli.strict, executor.daily_frequency())?);
            }

            if cli.format == OutputFormat::Json {
                return write_json(out, &analytics);
            }
            let sections = [
                ("Airline frequency", "Airline", &analytics.airlines),
                ("Busy airports", "City", &analytics.airports),
                ("Daily flight frequency", "Date", &analytics.daily),
            ];
            let mut first = true;
            for (title, label, freq) in sections {
                let Some(freq) = freq else { continue };
                if !first {
                    writeln!(out)?;
                }
                first = false;
                if cli.format == OutputFormat::Markdown {
                    writeln!(out, "## {}\n", title)?;
                } else if cli.format == OutputFormat::Text {
                    writeln!(out, "== {} ==", title)?;
                }
                write_grid(out, cli.format, &ResultsGrid::from_frequency(label, freq))?;
            }
            Ok(())
        }
    }
}

/// Strict mode propagates query errors; otherwise they become empty results.
fn settle<T: Default>(strict: bool, result: Result<T>) -> Result<T> {
    if strict {
        result
    } else {
        Ok(result.or_empty())
    }
}

fn write_grid<W: Write>(out: &mut W, format: OutputFormat, grid: &ResultsGrid) -> Result<()> {
    out.write_all(grid.export(format)?.as_bytes())?;
    Ok(())
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{PoolSettings, ResolvedSource, RetryPolicy};
    use crate::test_utils::FlightsFixture;
    use std::time::Duration;
    use tempfile::TempDir;

    fn provider(dir: &TempDir) -> ConnectionProvider {
        let path = dir.path().join("flights.db");
        FlightsFixture::create(&path, &FlightsFixture::sample_rows()).unwrap();
        ConnectionProvider::initialize(
            ResolvedSource::new("TEST", path),
            &PoolSettings::default(),
            &RetryPolicy::new(1, Duration::ZERO),
        )
        .unwrap()
    }

    fn run_args(provider: &ConnectionProvider, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("flightdeck").chain(args.iter().copied()))
            .expect("arguments should parse");
        let mut out = Vec::new();
        execute(&cli, provider, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_flights_command() {
        let cli = Cli::try_parse_from([
            "flightdeck",
            "--format",
            "csv",
            "flights",
            "Atlanta, GA",
            "Chicago, IL",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Csv);
        assert_eq!(
            cli.command,
            Commands::Flights {
                departure: "Atlanta, GA".to_string(),
                arrival: "Chicago, IL".to_string(),
            }
        );
    }

    #[test]
    fn test_analytics_defaults_to_all() {
        let cli = Cli::try_parse_from(["flightdeck", "analytics"]).unwrap();
        assert_eq!(cli.command, Commands::Analytics { chart: Chart::All });
    }

    #[test]
    fn test_cities_text_output_is_sorted() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);

        let output = run_args(&provider, &["cities"]).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "City");
        assert_eq!(
            &lines[2..],
            &["Atlanta, GA", "Boston, MA", "Chicago, IL", "Denver, CO"]
        );
    }

    #[test]
    fn test_flights_json_output() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);

        let output =
            run_args(&provider, &["--format", "json", "flights", "Atlanta, GA", "Chicago, IL"])
                .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        let flights = value.as_array().unwrap();
        assert_eq!(flights.len(), 2);
        assert_eq!(flights[0]["airline"], "Delta Air Lines Inc");
    }

    #[test]
    fn test_flights_without_match_prints_no_data() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);

        let output = run_args(&provider, &["flights", "Boston, MA", "Atlanta, GA"]).unwrap();
        assert_eq!(output, "no data\n");
    }

    #[test]
    fn test_analytics_single_chart_json() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);

        let output = run_args(&provider, &["--format", "json", "analytics", "airports"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(value.get("airlines").is_none());
        assert_eq!(value["airports"]["labels"][0], "Atlanta, GA");
        assert_eq!(value["airports"]["counts"][0], 4);
    }

    #[test]
    fn test_analytics_text_has_all_sections() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);

        let output = run_args(&provider, &["analytics"]).unwrap();
        assert!(output.contains("== Airline frequency =="));
        assert!(output.contains("== Busy airports =="));
        assert!(output.contains("== Daily flight frequency =="));
        assert!(output
            .lines()
            .any(|l| l.starts_with("Delta Air Lines Inc") && l.ends_with("| 3")));
    }

    #[test]
    fn test_check_reports_pool_status() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);

        let output = run_args(&provider, &["check"]).unwrap();
        assert!(output.contains("data source: TEST"));
        assert!(output.contains("of 20 max"));
    }

    #[test]
    fn test_settle() {
        let failed: Result<Vec<String>> =
            Err(crate::core::FlightsError::Config("boom".to_string()));
        assert!(settle(true, failed).is_err());

        let failed: Result<Vec<String>> =
            Err(crate::core::FlightsError::Config("boom".to_string()));
        assert_eq!(settle(false, failed).unwrap(), Vec::<String>::new());
    }
}

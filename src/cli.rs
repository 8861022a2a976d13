//! Command-line interface argument parsing for co2-gdp-tui.
//!
//! - `co2-gdp-tui show --countries USA,CHN,IND --start-year 1990`
//! - `co2-gdp-tui show --offline`
//! - `co2-gdp-tui sync --api-url http://localhost:5000`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::api::{current_year, validate_years, DEFAULT_BASE_URL};

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "CO2_GDP_API_URL";
/// Environment variable overriding the snapshot and log directory
pub const CACHE_DIR_ENV: &str = "CO2_GDP_CACHE_DIR";

const DEFAULT_START_YEAR: i32 = 1990;

/// A terminal dashboard for CO2 emissions against GDP per capita.
#[derive(Parser, Debug)]
#[command(name = "co2-gdp-tui")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the dashboard
    Show {
        /// Backend base URL (defaults to $CO2_GDP_API_URL, then http://localhost:5000)
        #[arg(long)]
        api_url: Option<String>,

        /// Read from the local snapshot instead of the backend
        #[arg(long)]
        offline: bool,

        /// Path to the snapshot database
        #[arg(long)]
        db: Option<PathBuf>,

        /// Comma-separated country codes to load, e.g. "USA,CHN,IND"
        #[arg(short, long)]
        countries: Option<String>,

        /// First year to load
        #[arg(long)]
        start_year: Option<i32>,

        /// Last year to load
        #[arg(long)]
        end_year: Option<i32>,

        /// Milliseconds per year when the timeline plays at 1x
        #[arg(long, default_value = "1000")]
        speed_ms: u64,

        /// Duration of point transitions in milliseconds
        #[arg(long, default_value = "750")]
        animation_ms: u64,
    },

    /// Fetch indicator data from the backend into the local snapshot
    Sync {
        /// Backend base URL (defaults to $CO2_GDP_API_URL, then http://localhost:5000)
        #[arg(long)]
        api_url: Option<String>,

        /// Path to the snapshot database
        #[arg(long)]
        db: Option<PathBuf>,

        /// Comma-separated country codes to fetch (defaults to all)
        #[arg(short, long)]
        countries: Option<String>,

        /// First year to fetch
        #[arg(long)]
        start_year: Option<i32>,

        /// Last year to fetch
        #[arg(long)]
        end_year: Option<i32>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Configuration derived from CLI arguments and the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub offline: bool,
    pub cache_dir: PathBuf,
    pub db_path: PathBuf,
    /// `None` loads every country
    pub countries: Option<Vec<String>>,
    pub start_year: i32,
    pub end_year: i32,
    pub animation_speed: Duration,
    pub animation_duration: Duration,
}

impl AppConfig {
    /// Create AppConfig from the `show` subcommand.
    ///
    /// The year range is checked here, before anything is sized from it.
    #[allow(clippy::too_many_arguments)]
    pub fn from_show_command(
        api_url: Option<String>,
        offline: bool,
        db: Option<PathBuf>,
        countries: Option<String>,
        start_year: Option<i32>,
        end_year: Option<i32>,
        speed_ms: u64,
        animation_ms: u64,
    ) -> Result<Self> {
        let start_year = start_year.unwrap_or(DEFAULT_START_YEAR);
        let end_year = end_year.unwrap_or_else(current_year);
        validate_years(start_year, Some(end_year)).context("Invalid year range")?;

        let cache_dir = cache_dir();
        Ok(AppConfig {
            api_url: resolve_api_url(api_url),
            offline,
            db_path: db.unwrap_or_else(|| cache_dir.join("snapshot.db")),
            cache_dir,
            countries: countries.as_deref().and_then(parse_countries),
            start_year,
            end_year,
            animation_speed: Duration::from_millis(speed_ms),
            animation_duration: Duration::from_millis(animation_ms),
        })
    }

    /// Create AppConfig from the `sync` subcommand
    pub fn from_sync_command(
        api_url: Option<String>,
        db: Option<PathBuf>,
        countries: Option<String>,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> Result<Self> {
        AppConfig::from_show_command(
            api_url, false, db, countries, start_year, end_year, 1000, 750,
        )
    }
}

/// Flag, then environment, then the default backend address
fn resolve_api_url(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var(API_URL_ENV).ok())
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Directory holding the snapshot and the log file
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::cache_dir()
        .map(|dir| dir.join("co2-gdp-tui"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Split a comma-separated code list; blank input means "all countries"
fn parse_countries(csv: &str) -> Option<Vec<String>> {
    let codes: Vec<String> = csv
        .split(',')
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect();
    if codes.is_empty() {
        None
    } else {
        Some(codes)
    }
}

//! SQLite snapshot of pre-fetched indicator data.
//!
//! Snapshot schema:
//! - `countries` table: code, name
//! - `observations` table: country_code, indicator, year, value
//! - `meta` table: key, value (currently only `fetched_at`)

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OpenFlags};

use super::models::{
    CombinedData, Country, CountryMeta, IndicatorSeries, CO2_INDICATOR, GDP_INDICATOR,
};
use super::source::DataSource;
use crate::api::{self, ApiError, QueryParams};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS countries (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS observations (
    country_code TEXT NOT NULL,
    indicator TEXT NOT NULL,
    year INTEGER NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (country_code, indicator, year)
);
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Parse a timestamp string into a DateTime<Utc>
fn parse_timestamp(timestamp: Option<String>) -> Option<DateTime<Utc>> {
    timestamp.and_then(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Storage interface for the snapshot database file
#[derive(Debug, Clone)]
pub struct Storage {
    db_path: PathBuf,
}

impl Storage {
    pub fn new(db_path: PathBuf) -> Self {
        Storage { db_path }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn exists(&self) -> bool {
        self.db_path.exists()
    }

    /// Open a read-only connection to the snapshot
    fn open_read_only(&self) -> Result<Connection> {
        if !self.db_path.exists() {
            anyhow::bail!("Snapshot not found: {:?}", self.db_path);
        }
        Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open snapshot: {:?}", self.db_path))
    }

    /// Replace the snapshot contents with freshly fetched data.
    ///
    /// Returns the number of observations written.
    pub fn write_snapshot(&self, countries: &[Country], combined: &CombinedData) -> Result<usize> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {parent:?}"))?;
            }
        }

        let mut conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open snapshot: {:?}", self.db_path))?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create snapshot schema")?;

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM countries", [])?;
        tx.execute("DELETE FROM observations", [])?;

        let mut written = 0;
        {
            let mut insert_country =
                tx.prepare("INSERT OR REPLACE INTO countries (code, name) VALUES (?1, ?2)")?;
            for country in countries {
                insert_country.execute(params![country.code, country.name])?;
            }

            let mut insert_obs = tx.prepare(
                "INSERT OR REPLACE INTO observations (country_code, indicator, year, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (indicator, series) in [
                (CO2_INDICATOR, &combined.data.co2_data),
                (GDP_INDICATOR, &combined.data.gdp_data),
            ] {
                for (code, years) in series {
                    for (year_key, value) in years {
                        let (Ok(year), Some(value)) = (year_key.trim().parse::<i32>(), value)
                        else {
                            continue;
                        };
                        insert_obs.execute(params![code, indicator, year, value])?;
                        written += 1;
                    }
                }
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('fetched_at', ?1)",
            params![Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        info!(
            "Wrote {written} observations for {} countries to {:?}",
            countries.len(),
            self.db_path
        );
        Ok(written)
    }

    /// When the snapshot was last written
    pub fn fetched_at(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.open_read_only()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'fetched_at'",
                [],
                |row| row.get(0),
            )
            .ok();
        Ok(parse_timestamp(value))
    }

    /// All countries in the snapshot, sorted by name
    pub fn list_countries(&self) -> Result<Vec<Country>> {
        let conn = self.open_read_only()?;
        let mut stmt = conn.prepare("SELECT code, name FROM countries ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Country {
                code: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut countries = Vec::new();
        for row in rows {
            countries.push(row?);
        }
        Ok(countries)
    }

    /// Rebuild the combined-data shape from stored observations.
    ///
    /// Applies the same country and year filters the backend would.
    pub fn read_combined(&self, query: &QueryParams) -> Result<CombinedData> {
        let conn = self.open_read_only()?;
        let start = query.start_year.unwrap_or(i32::MIN);
        let end = query.end_year.unwrap_or(i32::MAX);
        let wanted: Option<HashSet<String>> = query.countries.as_ref().map(|filter| {
            filter
                .tokens()
                .iter()
                .map(|t| t.trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect()
        });

        let mut combined = CombinedData::default();

        let mut stmt = conn.prepare(
            "SELECT country_code, indicator, year, value FROM observations
             WHERE year BETWEEN ?1 AND ?2
             ORDER BY country_code, year",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            let code: String = row.get(0)?;
            let indicator: String = row.get(1)?;
            let year: i32 = row.get(2)?;
            let value: f64 = row.get(3)?;
            Ok((code, indicator, year, value))
        })?;

        for row in rows {
            let (code, indicator, year, value) = row?;
            if let Some(wanted) = &wanted {
                if !wanted.contains(&code) {
                    continue;
                }
            }
            let series: &mut IndicatorSeries = match indicator.as_str() {
                CO2_INDICATOR => &mut combined.data.co2_data,
                GDP_INDICATOR => &mut combined.data.gdp_data,
                _ => continue,
            };
            series
                .entry(code)
                .or_default()
                .insert(year.to_string(), Some(value));
        }

        for country in self.list_countries()? {
            let present = combined.data.co2_data.contains_key(&country.code)
                || combined.data.gdp_data.contains_key(&country.code);
            if present {
                combined
                    .metadata
                    .countries
                    .insert(country.code, CountryMeta { name: country.name });
            }
        }

        Ok(combined)
    }
}

/// Offline `DataSource` reading a snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    storage: Storage,
}

impl SnapshotSource {
    pub fn new(storage: Storage) -> Self {
        SnapshotSource { storage }
    }
}

fn snapshot_error(err: anyhow::Error) -> ApiError {
    ApiError::Snapshot(format!("{err:#}"))
}

impl DataSource for SnapshotSource {
    fn countries(&self) -> api::Result<Vec<Country>> {
        self.storage.list_countries().map_err(snapshot_error)
    }

    fn combined_data(&self, params: &QueryParams) -> api::Result<CombinedData> {
        api::validate_query(params)?;
        self.storage.read_combined(params).map_err(snapshot_error)
    }

    fn describe(&self) -> String {
        format!("snapshot {}", self.storage.path().display())
    }
}

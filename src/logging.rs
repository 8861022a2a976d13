//! Log setup. The terminal belongs to the dashboard, so records go to a
//! file in the cache directory instead of stderr.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Environment variable holding the log filter, e.g. `debug` or `co2_gdp_tui=trace`
pub const LOG_ENV: &str = "CO2_GDP_LOG";

pub fn log_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("co2-gdp-tui.log")
}

/// Route `log` records to `<cache_dir>/co2-gdp-tui.log`.
///
/// Fails if the file cannot be opened; callers run without logging then.
pub fn init(cache_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
    let path = log_path(cache_dir);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Builder::from_env(Env::new().filter_or(LOG_ENV, "info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("Logger already initialized")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_is_in_cache_dir() {
        let path = log_path(Path::new("/var/cache/co2"));
        assert_eq!(path, PathBuf::from("/var/cache/co2/co2-gdp-tui.log"));
    }
}

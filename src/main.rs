//! co2-gdp-tui: a terminal dashboard plotting CO2 emissions against GDP per
//! capita for the world's countries, animated over time.
//!
//! Data comes from the indicator backend, or from a local SQLite snapshot
//! filled by the `sync` subcommand.

mod api;
mod app;
mod cli;
mod data;
mod events;
mod loader;
mod logging;
mod playback;
mod ui;

use anyhow::Result;
use cli::{AppConfig, Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    let config = match cli.command {
        Commands::Show {
            api_url,
            offline,
            db,
            countries,
            start_year,
            end_year,
            speed_ms,
            animation_ms,
        } => AppConfig::from_show_command(
            api_url,
            offline,
            db,
            countries,
            start_year,
            end_year,
            speed_ms,
            animation_ms,
        )?,
        Commands::Sync {
            api_url,
            db,
            countries,
            start_year,
            end_year,
        } => {
            let config =
                AppConfig::from_sync_command(api_url, db, countries, start_year, end_year)?;
            init_logging(&config);
            return app::run_sync(&config);
        }
    };

    init_logging(&config);

    // Run the TUI application
    app::run(config)
}

/// Logging is optional; the dashboard runs without it
fn init_logging(config: &AppConfig) {
    if let Err(e) = logging::init(&config.cache_dir) {
        eprintln!("Logging disabled: {e:#}");
    }
}

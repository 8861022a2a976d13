//! Client for the CO2/GDP indicator backend.
//!
//! Builds query strings, validates parameters and normalizes every failure
//! into [`ApiError`].

mod client;
mod error;
mod query;
mod validate;

pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use error::{ApiError, Result};
pub use query::{CountryFilter, QueryParams};
pub use validate::{current_year, validate_query, validate_years};

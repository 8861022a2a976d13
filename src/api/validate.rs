//! Client-side checks run before any request reaches the backend.

use chrono::{Datelike, Local};

use super::error::{ApiError, Result};
use super::query::{CountryFilter, QueryParams};

/// Earliest year the World Bank indicators cover
pub const MIN_YEAR: i32 = 1960;

/// Length of an ISO 3166-1 alpha-3 code
const COUNTRY_CODE_LEN: usize = 3;

/// Current calendar year in local time
pub fn current_year() -> i32 {
    Local::now().year()
}

/// Check a year range against `[1960, current year]`.
pub fn validate_years(start: i32, end: Option<i32>) -> Result<()> {
    let max_year = current_year();
    if !(MIN_YEAR..=max_year).contains(&start) {
        return Err(ApiError::Validation(format!(
            "Start year must be between {MIN_YEAR} and {max_year}"
        )));
    }
    if let Some(end) = end {
        if !(start..=max_year).contains(&end) {
            return Err(ApiError::Validation(format!(
                "End year must be between {start} and {max_year}"
            )));
        }
    }
    Ok(())
}

/// Check that every token of a country filter is a 3-letter code.
///
/// `None` passes. All offending tokens are listed in the error, with empty
/// tokens rendered as `(empty)`.
pub fn validate_countries(countries: Option<&CountryFilter>) -> Result<()> {
    let Some(filter) = countries else {
        return Ok(());
    };

    let invalid: Vec<String> = filter
        .tokens()
        .iter()
        .map(|token| token.trim())
        .filter(|token| token.chars().count() != COUNTRY_CODE_LEN)
        .map(|token| {
            if token.is_empty() {
                "(empty)".to_string()
            } else {
                token.to_string()
            }
        })
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Invalid country codes: {}",
            invalid.join(", ")
        )))
    }
}

/// Check every parameter of a data query.
///
/// Year validation is skipped when neither bound is given; a lone end
/// year is checked against the earliest supported start.
pub fn validate_query(params: &QueryParams) -> Result<()> {
    validate_countries(params.countries.as_ref())?;
    if params.start_year.is_some() || params.end_year.is_some() {
        validate_years(params.start_year.unwrap_or(MIN_YEAR), params.end_year)?;
    }
    Ok(())
}

//! Query parameters accepted by the data endpoints.

use url::form_urlencoded;

/// Country filter as accepted by the backend: either a raw comma-separated
/// string or a list of codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryFilter {
    Csv(String),
    List(Vec<String>),
}

impl CountryFilter {
    /// Comma-joined form sent on the wire
    pub fn to_csv(&self) -> String {
        match self {
            CountryFilter::Csv(s) => s.clone(),
            CountryFilter::List(codes) => codes.join(","),
        }
    }

    /// Individual tokens, split on commas for the string form
    pub fn tokens(&self) -> Vec<String> {
        match self {
            CountryFilter::Csv(s) => s.split(',').map(str::to_string).collect(),
            CountryFilter::List(codes) => codes.clone(),
        }
    }
}

impl From<&str> for CountryFilter {
    fn from(value: &str) -> Self {
        CountryFilter::Csv(value.to_string())
    }
}

impl From<Vec<String>> for CountryFilter {
    fn from(value: Vec<String>) -> Self {
        CountryFilter::List(value)
    }
}

impl From<&[&str]> for CountryFilter {
    fn from(value: &[&str]) -> Self {
        CountryFilter::List(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Options for `/api/data` and the per-indicator variants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub countries: Option<CountryFilter>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn countries(mut self, countries: impl Into<CountryFilter>) -> Self {
        self.countries = Some(countries.into());
        self
    }

    pub fn start_year(mut self, year: i32) -> Self {
        self.start_year = Some(year);
        self
    }

    pub fn end_year(mut self, year: i32) -> Self {
        self.end_year = Some(year);
        self
    }

    /// Encoded query string without the leading `?`.
    ///
    /// Absent options are omitted entirely; an empty string means no
    /// parameters at all.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(countries) = &self.countries {
            serializer.append_pair("countries", &countries.to_csv());
        }
        if let Some(start) = self.start_year {
            serializer.append_pair("start_year", &start.to_string());
        }
        if let Some(end) = self.end_year {
            serializer.append_pair("end_year", &end.to_string());
        }
        serializer.finish()
    }
}

//! The data-access seam the UI components are constructed with.

use crate::api::{ApiClient, QueryParams, Result};

use super::models::{CombinedData, Country};

/// Anything that can supply the country list and combined indicator data.
///
/// Implementations are shared with background load workers, hence the
/// `Send + Sync` bound.
pub trait DataSource: Send + Sync {
    fn countries(&self) -> Result<Vec<Country>>;

    fn combined_data(&self, params: &QueryParams) -> Result<CombinedData>;

    /// Short human-readable origin shown in the status bar
    fn describe(&self) -> String;
}

impl DataSource for ApiClient {
    fn countries(&self) -> Result<Vec<Country>> {
        ApiClient::countries(self).map(|response| response.countries)
    }

    fn combined_data(&self, params: &QueryParams) -> Result<CombinedData> {
        self.fetch_validated_data(params)
    }

    fn describe(&self) -> String {
        self.base_url().to_string()
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory source used by component tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::api::ApiError;

    #[derive(Debug, Default)]
    pub struct StaticSource {
        pub countries: Vec<Country>,
        pub combined: CombinedData,
        pub fail_with: Option<String>,
        pub calls: AtomicUsize,
    }

    impl StaticSource {
        pub fn with_countries(countries: &[(&str, &str)]) -> Self {
            StaticSource {
                countries: countries
                    .iter()
                    .map(|(code, name)| Country::new(*code, *name))
                    .collect(),
                ..Default::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            StaticSource {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }

        pub fn with_combined(combined: CombinedData) -> Self {
            StaticSource {
                combined,
                ..Default::default()
            }
        }
    }

    impl DataSource for StaticSource {
        fn countries(&self) -> Result<Vec<Country>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(message) => Err(ApiError::Network(message.clone())),
                None => Ok(self.countries.clone()),
            }
        }

        fn combined_data(&self, _params: &QueryParams) -> Result<CombinedData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(message) => Err(ApiError::Network(message.clone())),
                None => Ok(self.combined.clone()),
            }
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }
}

//! Data models for the World Bank indicator data.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// World Bank indicator code for CO2 emissions (metric tons per capita)
pub const CO2_INDICATOR: &str = "EN.ATM.CO2E.PC";
/// World Bank indicator code for GDP per capita (current US$)
pub const GDP_INDICATOR: &str = "NY.GDP.PCAP.CD";

/// A country as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

impl Country {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Country {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// One country in one year with both indicators present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub country: String,
    pub country_code: String,
    pub year: i32,
    pub co2_per_capita: f64,
    pub gdp_per_capita: f64,
}

/// `GET /` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `GET /api/countries` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountriesResponse {
    pub countries: Vec<Country>,
    #[serde(default)]
    pub count: usize,
}

/// Per-country, per-year values of a single indicator. Years arrive as JSON
/// object keys, values may be null.
pub type IndicatorSeries = HashMap<String, BTreeMap<String, Option<f64>>>;

/// The two indicator maps inside a combined response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorMaps {
    pub co2_data: IndicatorSeries,
    pub gdp_data: IndicatorSeries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryMeta {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataMetadata {
    #[serde(default)]
    pub countries: HashMap<String, CountryMeta>,
}

/// `GET /api/data` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombinedData {
    pub data: IndicatorMaps,
    #[serde(default)]
    pub metadata: DataMetadata,
}

/// Description of one indicator from `GET /api/indicators`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// `GET /api/indicators` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorsResponse {
    pub indicators: BTreeMap<String, Indicator>,
    #[serde(default)]
    pub count: usize,
}

impl CombinedData {
    /// Join both indicator maps into records.
    ///
    /// Only country/year pairs where both values are present and strictly
    /// positive are kept. Output is ordered by year, then country code.
    pub fn join_indicators(&self) -> Vec<DataPoint> {
        let mut points = Vec::new();

        for (code, co2_years) in &self.data.co2_data {
            let Some(gdp_years) = self.data.gdp_data.get(code) else {
                continue;
            };
            let name = self
                .metadata
                .countries
                .get(code)
                .map(|meta| meta.name.clone())
                .unwrap_or_else(|| code.clone());

            for (year_key, co2) in co2_years {
                let Ok(year) = year_key.trim().parse::<i32>() else {
                    continue;
                };
                let (Some(co2), Some(Some(gdp))) = (co2, gdp_years.get(year_key)) else {
                    continue;
                };
                if *co2 > 0.0 && *gdp > 0.0 {
                    points.push(DataPoint {
                        country: name.clone(),
                        country_code: code.clone(),
                        year,
                        co2_per_capita: *co2,
                        gdp_per_capita: *gdp,
                    });
                }
            }
        }

        points.sort_by(|a, b| {
            a.year
                .cmp(&b.year)
                .then_with(|| a.country_code.cmp(&b.country_code))
        });
        points
    }
}

/// Sorted unique years present in a set of points
pub fn unique_years(points: &[DataPoint]) -> Vec<i32> {
    points
        .iter()
        .map(|p| p.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

//! Data layer: indicator models, the `DataSource` seam and the SQLite snapshot.

mod models;
mod source;
mod storage;

pub use models::{
    unique_years, CombinedData, CountriesResponse, Country, DataPoint, HealthStatus,
    IndicatorsResponse,
};
pub use source::DataSource;
#[cfg(test)]
pub use source::testing;
pub use storage::{SnapshotSource, Storage};

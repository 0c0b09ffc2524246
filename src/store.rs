//! Read/write contracts the matcher and the ingest jobs depend on.

use crate::error::StoreError;
use crate::types::{DrawRecord, JoinedResult, WeatherRecord};

pub trait DrawStore {
    /// All draws, ascending by draw time (ties by draw number).
    fn list_draws(&self) -> Result<Vec<DrawRecord>, StoreError>;

    /// Inserts a new draw. Returns `false` without touching the store when the
    /// draw number is already present.
    fn insert_draw(&self, draw: &DrawRecord) -> Result<bool, StoreError>;

    fn count_draws(&self) -> Result<i64, StoreError>;
}

pub trait WeatherStore {
    /// All observations, ascending by observation time.
    fn list_weather(&self) -> Result<Vec<WeatherRecord>, StoreError>;

    /// Fails with [`StoreError::ConstraintViolation`] when a sample with the
    /// same observation time exists.
    fn insert_weather(&self, weather: &WeatherRecord) -> Result<(), StoreError>;

    fn count_weather(&self) -> Result<i64, StoreError>;
}

pub trait ResultStore {
    /// Clears the result table and inserts `results` in one transaction.
    /// On any failure the previous contents stay in place.
    fn replace_all(&self, results: &[JoinedResult]) -> Result<usize, StoreError>;

    /// All joined rows, ascending by draw number.
    fn list_all(&self) -> Result<Vec<JoinedResult>, StoreError>;

    fn count_results(&self) -> Result<i64, StoreError>;
}

use anyhow::{Context, Result};
use lotto_weather::SqliteStore;
use std::time::Duration;

/// Opens the shared store; the schema is created if the file is new.
pub fn conn(database_url: &str, busy_timeout: Duration) -> Result<SqliteStore> {
    SqliteStore::open(database_url, busy_timeout)
        .with_context(|| format!("Failed to open database {}", database_url))
}

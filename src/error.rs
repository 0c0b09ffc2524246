use thiserror::Error;

/// Errors raised by the SQLite-backed draw, weather and result stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or did not answer a probe query.
    #[error("storage unreachable at {path}: {source}")]
    Connectivity {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A natural key already exists. Callers treat this as "already have it".
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation(_))
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to fetch archive page: {0}")]
    Http(#[from] reqwest::Error),

    #[error("archive page returned status {status}")]
    Status { status: reqwest::StatusCode },

    #[error("no results table found on the archive page")]
    MissingTable,
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather API key is not configured (set OPENWEATHER_API_KEY)")]
    MissingApiKey,

    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("weather API rejected the key (401); check OPENWEATHER_API_KEY")]
    Unauthorized,

    #[error("city '{0}' not found (404)")]
    UnknownCity(String),

    #[error("weather API returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed weather response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("cancelled")]
    Cancelled,

    #[error("job '{job}' failed after {attempts} attempts")]
    Exhausted { job: String, attempts: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseCategoryError {
    pub kind: &'static str,
    pub value: String,
}

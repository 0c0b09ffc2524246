pub mod api;
pub mod config;
pub mod database;
pub mod error;
mod html;
pub mod logging;
pub mod matcher;
pub mod reports;
pub mod scheduler;
pub mod scraper;
pub mod store;
pub mod types;
pub mod use_cases;
pub mod utils;

pub use database::SqliteStore;
pub use error::{ScrapeError, SchedulerError, StoreError, WeatherError};
pub use matcher::{JoinOutcome, rebuild_join, run_match};
pub use store::{DrawStore, ResultStore, WeatherStore};
pub use types::*;

pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod format;
pub mod telegram;
pub mod use_cases;

pub use error::RelayError;
pub use telegram::{Notifier, TelegramClient};
pub use use_cases::{RelayOutcome, RelayUseCase};

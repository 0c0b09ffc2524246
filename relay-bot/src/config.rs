use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::error::RelayError;

pub const DEFAULT_QUERY: &str = "SELECT * FROM joined_results ORDER BY draw_number";
pub const DEFAULT_MESSAGE: &str = "Draws and weather from the database";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub busy_timeout: Duration,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    /// `None` sends plain text.
    pub parse_mode: Option<String>,
    pub sql_query: String,
}

impl Config {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let busy_timeout = match non_empty("DB_BUSY_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("Invalid value for DB_BUSY_TIMEOUT_SECS: '{}'", v))?,
            ),
            None => Duration::from_secs(30),
        };

        Ok(Config {
            database_url: non_empty("LOTTERY_DB_PATH").unwrap_or_else(|| "data/lottery.db".to_string()),
            busy_timeout,
            bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            chat_id: non_empty("TELEGRAM_CHAT_ID"),
            parse_mode: non_empty("TELEGRAM_PARSE_MODE"),
            sql_query: non_empty("SQL_QUERY").unwrap_or_else(|| DEFAULT_QUERY.to_string()),
        })
    }

    pub fn token(&self) -> Result<&str, RelayError> {
        self.bot_token.as_deref().ok_or(RelayError::MissingToken)
    }

    pub fn chat(&self) -> Result<&str, RelayError> {
        self.chat_id.as_deref().ok_or(RelayError::MissingChatId)
    }
}

pub fn load() -> Result<Config> {
    dotenvy::dotenv().ok();
    Config::from_lookup(|name| env::var(name).ok())
}

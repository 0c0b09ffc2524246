use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::matcher::DEFAULT_TOLERANCE_MINUTES;
use crate::scheduler::{RetryPolicy, parse_schedule};

pub const DEFAULT_ARCHIVE_URL: &str = "https://www.lotonews.ru/draws/archive/4x20";
pub const DEFAULT_SCHEDULE: &str = "10:00,12:00,13:00,16:00,16:20,18:00,20:00,22:00";
/// Draws are daily, so a wider window matches nothing useful.
pub const MAX_TOLERANCE_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub db_busy_timeout_secs: u64,
    pub tolerance_minutes: i64,
    pub draws_archive_url: String,
    pub weather: WeatherConfig,
    /// Comma separated `HH:MM` slots in local time.
    pub schedule_times: String,
    pub retry: RetrySettings,
    pub report_path: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub log_retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/lottery.db"),
            db_busy_timeout_secs: 30,
            tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
            draws_archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            weather: WeatherConfig::default(),
            schedule_times: DEFAULT_SCHEDULE.to_string(),
            retry: RetrySettings::default(),
            report_path: PathBuf::from("reports"),
            log_dir: Some(PathBuf::from("logs")),
            log_retention_days: 7,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            city: "Moscow".to_string(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 10,
            timeout_secs: 180,
        }
    }
}

impl Config {
    /// Match window. `validate` rejects out-of-range minutes; an unvalidated
    /// value is clamped into range.
    pub fn tolerance(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.tolerance_minutes.clamp(0, MAX_TOLERANCE_MINUTES))
            .unwrap_or_default()
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.db_busy_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff: Duration::from_secs(self.retry.backoff_secs),
            timeout: Duration::from_secs(self.retry.timeout_secs),
        }
    }

    /// Overrides fields from environment-style variables. `lookup` is
    /// `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOTTERY_DB_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DB_BUSY_TIMEOUT_SECS") {
            self.db_busy_timeout_secs = parse_var("DB_BUSY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("MATCH_TOLERANCE_MINUTES") {
            self.tolerance_minutes = parse_var("MATCH_TOLERANCE_MINUTES", &v)?;
        }
        if let Some(v) = lookup("DRAWS_ARCHIVE_URL") {
            self.draws_archive_url = v;
        }
        if let Some(v) = lookup("OPENWEATHER_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.weather.api_key = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("WEATHER_CITY") {
            self.weather.city = v;
        }
        if let Some(v) = lookup("SCHEDULE_TIMES") {
            self.schedule_times = v;
        }
        if let Some(v) = lookup("RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_var("RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("RETRY_BACKOFF_SECS") {
            self.retry.backoff_secs = parse_var("RETRY_BACKOFF_SECS", &v)?;
        }
        if let Some(v) = lookup("RETRY_TIMEOUT_SECS") {
            self.retry.timeout_secs = parse_var("RETRY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("REPORT_PATH") {
            self.report_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.log_dir = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Some(v) = lookup("LOG_RETENTION_DAYS") {
            self.log_retention_days = parse_var("LOG_RETENTION_DAYS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        tolerance_from_minutes(self.tolerance_minutes).context("Invalid MATCH_TOLERANCE_MINUTES")?;
        if self.retry.max_attempts == 0 {
            bail!("RETRY_MAX_ATTEMPTS must be at least 1");
        }
        if self.retry.timeout_secs == 0 {
            bail!("RETRY_TIMEOUT_SECS must be at least 1");
        }
        if self.log_retention_days < 1 {
            bail!("LOG_RETENTION_DAYS must be at least 1");
        }
        parse_schedule(&self.schedule_times).context("Invalid SCHEDULE_TIMES")?;
        Ok(())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Checked conversion for a tolerance given in minutes.
pub fn tolerance_from_minutes(minutes: i64) -> Result<TimeDelta> {
    if !(0..=MAX_TOLERANCE_MINUTES).contains(&minutes) {
        bail!(
            "match tolerance must be between 0 and {} minutes (got {})",
            MAX_TOLERANCE_MINUTES,
            minutes
        );
    }
    TimeDelta::try_minutes(minutes).context("match tolerance out of range")
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: '{}'", name, value))
}

/// Loads `.env`, the optional TOML file, then environment overrides.
pub fn load(config_file: Option<&Path>) -> Result<Config> {
    dotenvy::dotenv().ok();

    let mut config = match config_file {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env(|name| env::var(name).ok())?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.tolerance(), TimeDelta::minutes(10));
        assert_eq!(cfg.database_path, PathBuf::from("data/lottery.db"));
        assert_eq!(cfg.weather.city, "Moscow");

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_secs(10));
        assert_eq!(policy.timeout, Duration::from_secs(180));
        cfg.validate().unwrap();
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("LOTTERY_DB_PATH", "/tmp/x.db"),
            ("MATCH_TOLERANCE_MINUTES", "15"),
            ("OPENWEATHER_API_KEY", "  KEY  "),
            ("WEATHER_CITY", "Kazan"),
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("LOG_DIR", ""),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).cloned()).unwrap();

        assert_eq!(cfg.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.tolerance_minutes, 15);
        assert_eq!(cfg.weather.api_key.as_deref(), Some("KEY"));
        assert_eq!(cfg.weather.city, "Kazan");
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.log_dir, None);
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let env = vars(&[("MATCH_TOLERANCE_MINUTES", "ten")]);
        let mut cfg = Config::default();
        let err = cfg.apply_env(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("MATCH_TOLERANCE_MINUTES"));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let cfg = Config {
            tolerance_minutes: -1,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn huge_tolerance_is_rejected_without_panicking() {
        let env = vars(&[("MATCH_TOLERANCE_MINUTES", "9223372036854775807")]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).cloned()).unwrap();

        let err = cfg.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("MATCH_TOLERANCE_MINUTES"));
        assert_eq!(cfg.tolerance(), TimeDelta::minutes(MAX_TOLERANCE_MINUTES));
    }

    #[test]
    fn tolerance_bounds_are_inclusive() {
        assert_eq!(tolerance_from_minutes(0).unwrap(), TimeDelta::zero());
        assert_eq!(
            tolerance_from_minutes(MAX_TOLERANCE_MINUTES).unwrap(),
            TimeDelta::days(1)
        );
        assert!(tolerance_from_minutes(MAX_TOLERANCE_MINUTES + 1).is_err());
        assert!(tolerance_from_minutes(i64::MIN).is_err());
    }

    #[test]
    fn bad_schedule_is_rejected() {
        let cfg = Config {
            schedule_times: "10:00,25:99".to_string(),
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("SCHEDULE_TIMES"));
    }

    #[test]
    fn toml_file_fills_in_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
tolerance_minutes = 5

[weather]
city = "Sochi"
"#,
        )
        .unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.tolerance_minutes, 5);
        assert_eq!(cfg.weather.city, "Sochi");
        assert_eq!(cfg.weather.api_key, None);
        assert_eq!(cfg.retry.max_attempts, 3);
    }
}

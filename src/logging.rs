use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeDelta};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const LOG_PREFIX: &str = "parser_";
const LOG_SUFFIX: &str = ".log";

pub fn log_file_name(date: NaiveDate) -> String {
    format!("{}{}{}", LOG_PREFIX, date.format("%Y-%m-%d"), LOG_SUFFIX)
}

fn log_file_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .strip_prefix(LOG_PREFIX)?
        .strip_suffix(LOG_SUFFIX)?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// Removes `parser_YYYY-MM-DD.log` files dated `retention_days` or more
/// before `today`. Other files in the directory are left alone.
pub fn cleanup_old_logs(dir: &Path, retention_days: i64, today: NaiveDate) -> Result<Vec<PathBuf>> {
    let cutoff = today - TimeDelta::days(retention_days);
    let mut removed = Vec::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(date) = name.to_str().and_then(log_file_date) else {
            continue;
        };
        if date <= cutoff {
            let path = entry.path();
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed.push(path);
        }
    }

    removed.sort();
    Ok(removed)
}

/// Installs the global subscriber: stderr always, plus a plain-text daily
/// file when `log_dir` is set. `RUST_LOG` narrows or widens the default
/// `info` level.
pub fn init(log_dir: Option<&Path>, retention_days: i64) -> Result<()> {
    let today = Local::now().date_naive();

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(today));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(file_layer)
        .init();

    if let Some(dir) = log_dir {
        for path in cleanup_old_logs(dir, retention_days, today)? {
            tracing::info!(file = %path.display(), "removed old log file");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn file_names_round_trip_to_dates() {
        assert_eq!(log_file_name(day(5)), "parser_2024-03-05.log");
        assert_eq!(log_file_date("parser_2024-03-05.log"), Some(day(5)));
        assert_eq!(log_file_date("parser_latest.log"), None);
        assert_eq!(log_file_date("other_2024-03-05.log"), None);
    }

    #[test]
    fn cleanup_keeps_the_retention_window() {
        let dir = tempfile::tempdir().unwrap();
        for d in [1, 2, 3, 8, 9, 10] {
            fs::write(dir.path().join(log_file_name(day(d))), "x").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let removed = cleanup_old_logs(dir.path(), 7, day(10)).unwrap();
        let names: Vec<_> = removed
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "parser_2024-03-01.log",
                "parser_2024-03-02.log",
                "parser_2024-03-03.log"
            ]
        );
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join(log_file_name(day(8))).exists());
    }

    #[test]
    fn cleanup_of_missing_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let removed = cleanup_old_logs(&dir.path().join("absent"), 7, day(10)).unwrap();
        assert!(removed.is_empty());
    }
}

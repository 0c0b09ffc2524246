use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, Row, params};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{DrawStore, ResultStore, WeatherStore};
use crate::types::{
    DrawRecord, JoinedResult, NUMBERS_PER_DRAW, Precipitation, WeatherRecord, WindDirection,
};
use crate::utils::format_timestamp;

const DRAW_COLUMNS: &str =
    "draw_number, draw_time, ball1, ball2, ball3, ball4, ball5, ball6, ball7, ball8";
const WEATHER_COLUMNS: &str =
    "observation_time, temperature, humidity, pressure, wind_speed, wind_direction, precipitation";
const WEATHER_FIELDS: usize = 7;

/// SQLite-backed implementation of the draw, weather and result stores.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database file and makes sure the schema exists.
    /// Any failure here is reported as [`StoreError::Connectivity`].
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Connectivity {
                path: display.clone(),
                source: rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directories: {}", e)),
                ),
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Connectivity {
            path: display.clone(),
            source,
        })?;
        Self::init(conn, busy_timeout, display)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Connectivity {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::init(conn, Duration::from_secs(5), ":memory:".to_string())
    }

    fn init(conn: Connection, busy_timeout: Duration, path: String) -> Result<Self, StoreError> {
        let probe = conn
            .busy_timeout(busy_timeout)
            .and_then(|_| {
                conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
                    row.get::<_, i64>(0)
                })
            });
        if let Err(source) = probe {
            return Err(StoreError::Connectivity { path, source });
        }

        create_tables(&conn)?;
        debug!(path = %path, "store ready");
        Ok(Self { conn })
    }

    /// Raw connection, for ad-hoc read queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS lottery_draws (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            draw_number INTEGER NOT NULL UNIQUE,
            draw_time TEXT NOT NULL,
            ball1 INTEGER NOT NULL,
            ball2 INTEGER NOT NULL,
            ball3 INTEGER NOT NULL,
            ball4 INTEGER NOT NULL,
            ball5 INTEGER NOT NULL,
            ball6 INTEGER NOT NULL,
            ball7 INTEGER NOT NULL,
            ball8 INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS weather_observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            observation_time TEXT NOT NULL UNIQUE,
            temperature REAL NOT NULL,
            humidity INTEGER NOT NULL,
            pressure INTEGER NOT NULL,
            wind_speed REAL NOT NULL,
            wind_direction TEXT NOT NULL,
            precipitation TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS joined_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            draw_number INTEGER NOT NULL UNIQUE,
            draw_time TEXT NOT NULL,
            ball1 INTEGER NOT NULL,
            ball2 INTEGER NOT NULL,
            ball3 INTEGER NOT NULL,
            ball4 INTEGER NOT NULL,
            ball5 INTEGER NOT NULL,
            ball6 INTEGER NOT NULL,
            ball7 INTEGER NOT NULL,
            ball8 INTEGER NOT NULL,
            observation_time TEXT NOT NULL,
            temperature REAL NOT NULL,
            humidity INTEGER NOT NULL,
            pressure INTEGER NOT NULL,
            wind_speed REAL NOT NULL,
            wind_direction TEXT NOT NULL,
            precipitation TEXT NOT NULL,
            time_delta_minutes INTEGER NOT NULL
        );",
    )
}

fn draw_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<DrawRecord> {
    let mut numbers = [0i32; NUMBERS_PER_DRAW];
    for (i, number) in numbers.iter_mut().enumerate() {
        *number = row.get(start + 2 + i)?;
    }

    Ok(DrawRecord {
        draw_number: row.get(start)?,
        draw_time: row.get(start + 1)?,
        numbers,
    })
}

fn weather_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<WeatherRecord> {
    Ok(WeatherRecord {
        observation_time: row.get(start)?,
        temperature: row.get(start + 1)?,
        humidity: row.get(start + 2)?,
        pressure: row.get(start + 3)?,
        wind_speed: row.get(start + 4)?,
        wind_direction: row.get(start + 5)?,
        precipitation: row.get(start + 6)?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation)
}

impl DrawStore for SqliteStore {
    fn list_draws(&self) -> Result<Vec<DrawRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DRAW_COLUMNS} FROM lottery_draws ORDER BY draw_time, draw_number"
        ))?;
        let draw_iter = stmt.query_map([], |row| draw_from_row(row, 0))?;

        let mut draws = Vec::new();
        for draw in draw_iter {
            draws.push(draw?);
        }
        Ok(draws)
    }

    fn insert_draw(&self, draw: &DrawRecord) -> Result<bool, StoreError> {
        let n = &draw.numbers;
        let changed = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO lottery_draws ({DRAW_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                draw.draw_number,
                format_timestamp(&draw.draw_time),
                n[0],
                n[1],
                n[2],
                n[3],
                n[4],
                n[5],
                n[6],
                n[7],
            ],
        )?;
        Ok(changed > 0)
    }

    fn count_draws(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM lottery_draws", [], |row| row.get(0))?)
    }
}

impl WeatherStore for SqliteStore {
    fn list_weather(&self) -> Result<Vec<WeatherRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WEATHER_COLUMNS} FROM weather_observations ORDER BY observation_time"
        ))?;
        let weather_iter = stmt.query_map([], |row| weather_from_row(row, 0))?;

        let mut observations = Vec::new();
        for weather in weather_iter {
            observations.push(weather?);
        }
        Ok(observations)
    }

    fn insert_weather(&self, weather: &WeatherRecord) -> Result<(), StoreError> {
        let observed_at = format_timestamp(&weather.observation_time);
        self.conn
            .execute(
                &format!(
                    "INSERT INTO weather_observations ({WEATHER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    observed_at,
                    weather.temperature,
                    weather.humidity,
                    weather.pressure,
                    weather.wind_speed,
                    weather.wind_direction,
                    weather.precipitation,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::ConstraintViolation(format!(
                        "weather observation at {} already exists",
                        observed_at
                    ))
                } else {
                    StoreError::Storage(e)
                }
            })?;
        Ok(())
    }

    fn count_weather(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM weather_observations", [], |row| {
                row.get(0)
            })?)
    }
}

impl ResultStore for SqliteStore {
    fn replace_all(&self, results: &[JoinedResult]) -> Result<usize, StoreError> {
        // Dropping `tx` on an early return rolls everything back.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM joined_results", [])?;
        tx.execute(
            "DELETE FROM sqlite_sequence WHERE name = 'joined_results'",
            [],
        )?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO joined_results ({DRAW_COLUMNS}, {WEATHER_COLUMNS}, time_delta_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ))?;

            for result in results {
                let n = &result.draw.numbers;
                let w = &result.weather;
                stmt.execute(params![
                    result.draw.draw_number,
                    format_timestamp(&result.draw.draw_time),
                    n[0],
                    n[1],
                    n[2],
                    n[3],
                    n[4],
                    n[5],
                    n[6],
                    n[7],
                    format_timestamp(&w.observation_time),
                    w.temperature,
                    w.humidity,
                    w.pressure,
                    w.wind_speed,
                    w.wind_direction,
                    w.precipitation,
                    result.time_delta_minutes,
                ])?;
            }
        }

        tx.commit()?;
        Ok(results.len())
    }

    fn list_all(&self) -> Result<Vec<JoinedResult>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DRAW_COLUMNS}, {WEATHER_COLUMNS}, time_delta_minutes
             FROM joined_results ORDER BY draw_number"
        ))?;
        let delta_index = 2 + NUMBERS_PER_DRAW + WEATHER_FIELDS;
        let result_iter = stmt.query_map([], |row| {
            Ok(JoinedResult {
                draw: draw_from_row(row, 0)?,
                weather: weather_from_row(row, 2 + NUMBERS_PER_DRAW)?,
                time_delta_minutes: row.get(delta_index)?,
            })
        })?;

        let mut results = Vec::new();
        for result in result_iter {
            results.push(result?);
        }
        Ok(results)
    }

    fn count_results(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM joined_results", [], |row| row.get(0))?)
    }
}

impl ToSql for WindDirection {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for WindDirection {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Precipitation {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Precipitation {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

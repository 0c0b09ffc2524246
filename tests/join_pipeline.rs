use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::time::Duration;

use lotto_weather::reports::{render_summary, summary_line};
use lotto_weather::{
    DrawRecord, DrawStore, JoinedResult, Precipitation, ResultStore, SqliteStore, StoreError,
    WeatherRecord, WeatherStore, WindDirection, run_match,
};

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn draw(number: i64, time: NaiveDateTime) -> DrawRecord {
    DrawRecord {
        draw_number: number,
        draw_time: time,
        numbers: [2, 4, 6, 8, 11, 13, 15, 17],
    }
}

fn weather(time: NaiveDateTime) -> WeatherRecord {
    WeatherRecord {
        observation_time: time,
        temperature: -4.2,
        humidity: 85,
        pressure: 747,
        wind_speed: 5.5,
        wind_direction: WindDirection::SouthWest,
        precipitation: Precipitation::Snow,
    }
}

fn tolerance() -> TimeDelta {
    TimeDelta::minutes(10)
}

fn file_store(dir: &tempfile::TempDir) -> SqliteStore {
    SqliteStore::open(dir.path().join("data").join("lottery.db"), Duration::from_secs(5)).unwrap()
}

#[test]
fn draw_matches_the_closest_sample_in_a_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    store.insert_draw(&draw(1001, at(10, 0))).unwrap();
    store.insert_weather(&weather(at(10, 30))).unwrap();
    store.insert_weather(&weather(at(10, 7))).unwrap();

    let outcome = run_match(&store, tolerance()).unwrap();
    assert_eq!(outcome.matched_count(), 1);
    assert_eq!(outcome.unmatched_count(), 0);

    let stored = store.list_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].draw.draw_number, 1001);
    assert_eq!(stored[0].weather.observation_time, at(10, 7));
    assert_eq!(stored[0].time_delta_minutes, 7);
    assert_eq!(stored[0].weather.wind_direction, WindDirection::SouthWest);
}

#[test]
fn draw_without_weather_reports_zero_matches() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    store.insert_draw(&draw(1002, at(9, 0))).unwrap();

    let outcome = run_match(&store, tolerance()).unwrap();
    assert_eq!(store.count_results().unwrap(), 0);
    assert_eq!(
        summary_line(&outcome),
        "0 processed matches, 1 unmatched (total draws: 1)"
    );
    assert!(render_summary(&outcome, tolerance()).contains("no weather data"));
}

#[test]
fn repeated_runs_give_identical_tables() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert_draw(&draw(1, at(10, 0))).unwrap();
    store.insert_draw(&draw(2, at(12, 0))).unwrap();
    store.insert_weather(&weather(at(10, 3))).unwrap();
    store.insert_weather(&weather(at(11, 58))).unwrap();

    run_match(&store, tolerance()).unwrap();
    let first = store.list_all().unwrap();
    run_match(&store, tolerance()).unwrap();
    let second = store.list_all().unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn new_draw_adds_at_most_one_row() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert_draw(&draw(1, at(10, 0))).unwrap();
    store.insert_weather(&weather(at(10, 3))).unwrap();
    store.insert_weather(&weather(at(13, 1))).unwrap();
    run_match(&store, tolerance()).unwrap();
    assert_eq!(store.count_results().unwrap(), 1);

    store.insert_draw(&draw(2, at(13, 0))).unwrap();
    for _ in 0..3 {
        run_match(&store, tolerance()).unwrap();
        assert_eq!(store.count_results().unwrap(), 2);
    }

    store.insert_draw(&draw(3, at(20, 0))).unwrap();
    run_match(&store, tolerance()).unwrap();
    assert_eq!(store.count_results().unwrap(), 2);
}

#[test]
fn failed_rebuild_keeps_the_previous_rows() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert_draw(&draw(1, at(10, 0))).unwrap();
    store.insert_weather(&weather(at(10, 3))).unwrap();
    run_match(&store, tolerance()).unwrap();
    let before = store.list_all().unwrap();

    // the third row repeats a draw number and violates the unique key
    let row = |n: i64| JoinedResult::new(draw(n, at(10, 0)), weather(at(10, 3)), TimeDelta::minutes(3));
    let err = store.replace_all(&[row(7), row(8), row(7)]).unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));

    assert_eq!(store.list_all().unwrap(), before);
}

#[test]
fn unreachable_store_is_a_connectivity_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SqliteStore::open(dir.path(), Duration::from_secs(1)).err().unwrap();
    assert!(matches!(err, StoreError::Connectivity { .. }));
}

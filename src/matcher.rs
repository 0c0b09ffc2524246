//! Nearest-timestamp join between lottery draws and weather observations.
//!
//! Every draw is matched independently against the full weather series: the
//! sample with the smallest absolute time distance wins, provided that
//! distance does not exceed the tolerance. The tolerance is inclusive. When two
//! samples are equally close the one seen first wins, and since the series is
//! sorted by observation time that is always the earlier sample.
//!
//! A weather sample is never marked as consumed, so one sample can be the match
//! for several draws. Callers that need one-to-one pairing have to enforce it
//! on top of [`rebuild_join`].

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::{DrawStore, ResultStore, WeatherStore};
use crate::types::{DrawRecord, JoinedResult, WeatherRecord};

pub const DEFAULT_TOLERANCE_MINUTES: i64 = 10;

/// Closest weather sample to an unmatched draw, outside the tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestSample {
    pub observation_time: NaiveDateTime,
    pub delta: TimeDelta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedDraw {
    pub draw: DrawRecord,
    /// `None` only when there is no weather data at all.
    pub nearest: Option<NearestSample>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinOutcome {
    pub matched: Vec<JoinedResult>,
    pub unmatched: Vec<UnmatchedDraw>,
}

impl JoinOutcome {
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    pub fn total_processed(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }
}

/// Joins `draws` (ascending by draw time) with `weathers` (ascending by
/// observation time).
///
/// Samples are not consumed: one sample may serve several draws. One-to-one
/// pairing would go here as a `used` set over `weathers` indices.
pub fn rebuild_join(
    draws: &[DrawRecord],
    weathers: &[WeatherRecord],
    tolerance: TimeDelta,
) -> JoinOutcome {
    let mut outcome = JoinOutcome::default();

    for draw in draws {
        match closest_within(draw.draw_time, weathers, tolerance) {
            Some((weather, delta)) => {
                debug!(
                    draw = draw.draw_number,
                    observed_at = %weather.observation_time,
                    delta_secs = delta.num_seconds(),
                    "draw matched"
                );
                outcome
                    .matched
                    .push(JoinedResult::new(draw.clone(), weather.clone(), delta));
            }
            None => outcome.unmatched.push(UnmatchedDraw {
                draw: draw.clone(),
                nearest: nearest_sample(draw.draw_time, weathers),
            }),
        }
    }

    outcome
}

fn closest_within(
    at: NaiveDateTime,
    weathers: &[WeatherRecord],
    tolerance: TimeDelta,
) -> Option<(&WeatherRecord, TimeDelta)> {
    let mut best: Option<&WeatherRecord> = None;
    let mut best_delta = tolerance;

    for weather in weathers {
        let delta = (at - weather.observation_time).abs();
        if delta <= tolerance && (best.is_none() || delta < best_delta) {
            best = Some(weather);
            best_delta = delta;
        }
    }

    best.map(|weather| (weather, best_delta))
}

fn nearest_sample(at: NaiveDateTime, weathers: &[WeatherRecord]) -> Option<NearestSample> {
    // min_by_key keeps the first of equal minima
    weathers
        .iter()
        .map(|w| NearestSample {
            observation_time: w.observation_time,
            delta: (at - w.observation_time).abs(),
        })
        .min_by_key(|sample| sample.delta)
}

/// Loads both series, joins them and replaces the stored result set.
///
/// Nothing is written until both series have been read, and the write itself
/// is a single transaction, so a failure leaves the previous results intact.
pub fn run_match<S>(store: &S, tolerance: TimeDelta) -> Result<JoinOutcome, StoreError>
where
    S: DrawStore + WeatherStore + ResultStore,
{
    let draws = store.list_draws()?;
    let weathers = store.list_weather()?;
    info!(
        draws = draws.len(),
        observations = weathers.len(),
        tolerance_secs = tolerance.num_seconds(),
        "loaded series"
    );

    let outcome = rebuild_join(&draws, &weathers, tolerance);
    let written = store.replace_all(&outcome.matched)?;

    info!(
        matched = written,
        unmatched = outcome.unmatched_count(),
        total = outcome.total_processed(),
        "join rebuilt"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Precipitation, WindDirection};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn draw(number: i64, time: NaiveDateTime) -> DrawRecord {
        DrawRecord {
            draw_number: number,
            draw_time: time,
            numbers: [1, 2, 3, 4, 5, 6, 7, 8],
        }
    }

    fn weather(time: NaiveDateTime, temperature: f64) -> WeatherRecord {
        WeatherRecord {
            observation_time: time,
            temperature,
            humidity: 70,
            pressure: 750,
            wind_speed: 2.0,
            wind_direction: WindDirection::East,
            precipitation: Precipitation::Rain,
        }
    }

    fn tolerance() -> TimeDelta {
        TimeDelta::minutes(DEFAULT_TOLERANCE_MINUTES)
    }

    #[test]
    fn sample_exactly_at_tolerance_matches() {
        let draws = [draw(1, at(10, 0, 0))];
        let before = rebuild_join(&draws, &[weather(at(9, 50, 0), 1.0)], tolerance());
        let after = rebuild_join(&draws, &[weather(at(10, 10, 0), 1.0)], tolerance());

        assert_eq!(before.matched_count(), 1);
        assert_eq!(before.matched[0].time_delta_minutes, 10);
        assert_eq!(after.matched_count(), 1);
        assert_eq!(after.matched[0].time_delta_minutes, 10);
    }

    #[test]
    fn sample_one_second_past_tolerance_does_not_match() {
        let draws = [draw(1, at(10, 0, 0))];
        let weathers = [weather(at(10, 10, 1), 1.0)];
        let outcome = rebuild_join(&draws, &weathers, tolerance());

        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.unmatched_count(), 1);
        let nearest = outcome.unmatched[0].nearest.as_ref().unwrap();
        assert_eq!(nearest.observation_time, at(10, 10, 1));
        assert_eq!(nearest.delta, TimeDelta::seconds(601));
    }

    #[test]
    fn equidistant_samples_resolve_to_the_earlier_one() {
        let draws = [draw(1, at(10, 0, 0))];
        let weathers = [weather(at(9, 55, 0), 1.0), weather(at(10, 5, 0), 2.0)];
        let outcome = rebuild_join(&draws, &weathers, tolerance());

        assert_eq!(outcome.matched_count(), 1);
        assert_eq!(outcome.matched[0].weather.observation_time, at(9, 55, 0));
        assert_eq!(outcome.matched[0].time_delta_minutes, 5);
    }

    #[test]
    fn closest_sample_wins_over_earlier_ones() {
        let draws = [draw(1, at(10, 0, 0))];
        let weathers = [
            weather(at(9, 51, 0), 1.0),
            weather(at(9, 58, 0), 2.0),
            weather(at(10, 3, 0), 3.0),
        ];
        let outcome = rebuild_join(&draws, &weathers, tolerance());
        assert_eq!(outcome.matched[0].weather.observation_time, at(9, 58, 0));
        assert_eq!(outcome.matched[0].time_delta_minutes, 2);
    }

    #[test]
    fn draw_at_ten_matches_the_ten_oh_seven_sample() {
        let draws = [DrawRecord {
            draw_number: 1001,
            draw_time: at(10, 0, 0),
            numbers: [1, 2, 3, 4, 5, 6, 7, 8],
        }];
        let weathers = [weather(at(10, 7, 0), 1.0), weather(at(10, 30, 0), 2.0)];
        let outcome = rebuild_join(&draws, &weathers, tolerance());

        assert_eq!(outcome.matched_count(), 1);
        assert!(outcome.unmatched.is_empty());
        let joined = &outcome.matched[0];
        assert_eq!(joined.draw.draw_number, 1001);
        assert_eq!(joined.weather.observation_time, at(10, 7, 0));
        assert_eq!(joined.time_delta_minutes, 7);
    }

    #[test]
    fn draw_without_weather_is_unmatched_without_diagnostics() {
        let draws = [draw(1002, at(9, 0, 0))];
        let outcome = rebuild_join(&draws, &[], tolerance());

        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.unmatched_count(), 1);
        assert_eq!(outcome.unmatched[0].draw.draw_number, 1002);
        assert_eq!(outcome.unmatched[0].nearest, None);
        assert_eq!(outcome.total_processed(), 1);
    }

    #[test]
    fn empty_inputs_produce_an_empty_outcome() {
        let outcome = rebuild_join(&[], &[weather(at(9, 0, 0), 1.0)], tolerance());
        assert_eq!(outcome, JoinOutcome::default());
        assert_eq!(outcome.total_processed(), 0);
    }

    #[test]
    fn one_sample_can_serve_several_draws() {
        let draws = [draw(1, at(10, 0, 0)), draw(2, at(10, 4, 0))];
        let weathers = [weather(at(10, 2, 0), 1.0)];
        let outcome = rebuild_join(&draws, &weathers, tolerance());

        assert_eq!(outcome.matched_count(), 2);
        assert!(
            outcome
                .matched
                .iter()
                .all(|m| m.weather.observation_time == at(10, 2, 0))
        );
    }

    #[test]
    fn delta_minutes_round_down() {
        let draws = [draw(1, at(10, 0, 0))];
        let weathers = [weather(at(10, 9, 59), 1.0)];
        let outcome = rebuild_join(&draws, &weathers, tolerance());
        assert_eq!(outcome.matched[0].time_delta_minutes, 9);
    }

    #[test]
    fn zero_tolerance_needs_an_exact_timestamp() {
        let draws = [draw(1, at(10, 0, 0)), draw(2, at(12, 0, 0))];
        let weathers = [weather(at(10, 0, 0), 1.0), weather(at(12, 0, 1), 2.0)];
        let outcome = rebuild_join(&draws, &weathers, TimeDelta::zero());

        assert_eq!(outcome.matched_count(), 1);
        assert_eq!(outcome.matched[0].draw.draw_number, 1);
        assert_eq!(outcome.unmatched[0].draw.draw_number, 2);
    }
}

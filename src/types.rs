use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseCategoryError;

pub const NUMBERS_PER_DRAW: usize = 8;

/// One 4x20 draw as published in the archive. `numbers` keeps the drawn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub draw_number: i64,
    pub draw_time: NaiveDateTime,
    pub numbers: [i32; NUMBERS_PER_DRAW],
}

/// One weather sample. `observation_time` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub observation_time: NaiveDateTime,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Percent.
    pub humidity: i32,
    /// Millimetres of mercury.
    pub pressure: i32,
    /// Metres per second.
    pub wind_speed: f64,
    pub wind_direction: WindDirection,
    pub precipitation: Precipitation,
}

/// A draw paired with the weather sample nearest to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedResult {
    pub draw: DrawRecord,
    pub weather: WeatherRecord,
    pub time_delta_minutes: i64,
}

impl JoinedResult {
    pub fn new(draw: DrawRecord, weather: WeatherRecord, delta: TimeDelta) -> Self {
        Self {
            draw,
            weather,
            // delta is never negative, so truncation is a floor
            time_delta_minutes: delta.num_minutes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    Unknown,
}

impl WindDirection {
    const COMPASS: [WindDirection; 8] = [
        WindDirection::North,
        WindDirection::NorthEast,
        WindDirection::East,
        WindDirection::SouthEast,
        WindDirection::South,
        WindDirection::SouthWest,
        WindDirection::West,
        WindDirection::NorthWest,
    ];

    /// Maps a meteorological bearing to one of eight 45° sectors. Bearings on
    /// a sector boundary go to the even sector.
    pub fn from_degrees(degrees: Option<f64>) -> Self {
        match degrees {
            Some(deg) if deg.is_finite() => {
                let index = (deg / 45.0).round_ties_even().rem_euclid(8.0) as usize;
                Self::COMPASS[index]
            }
            _ => WindDirection::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindDirection::North => "north",
            WindDirection::NorthEast => "north-east",
            WindDirection::East => "east",
            WindDirection::SouthEast => "south-east",
            WindDirection::South => "south",
            WindDirection::SouthWest => "south-west",
            WindDirection::West => "west",
            WindDirection::NorthWest => "north-west",
            WindDirection::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WindDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindDirection {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::COMPASS
            .iter()
            .chain(std::iter::once(&WindDirection::Unknown))
            .find(|d| d.as_str() == s)
            .copied()
            .ok_or_else(|| ParseCategoryError {
                kind: "wind direction",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precipitation {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Fog,
    VariableCloudiness,
}

impl Precipitation {
    /// Classifies an OpenWeather condition id.
    pub fn from_condition_id(id: i64) -> Self {
        match id {
            200..=232 => Precipitation::Thunderstorm,
            300..=321 => Precipitation::Drizzle,
            500..=531 => Precipitation::Rain,
            600..=622 => Precipitation::Snow,
            701..=781 => Precipitation::Fog,
            _ => Precipitation::VariableCloudiness,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Precipitation::Thunderstorm => "thunderstorm",
            Precipitation::Drizzle => "drizzle",
            Precipitation::Rain => "rain",
            Precipitation::Snow => "snow",
            Precipitation::Fog => "fog",
            Precipitation::VariableCloudiness => "variable cloudiness",
        }
    }

    pub const fn all() -> &'static [Precipitation] {
        &[
            Precipitation::Thunderstorm,
            Precipitation::Drizzle,
            Precipitation::Rain,
            Precipitation::Snow,
            Precipitation::Fog,
            Precipitation::VariableCloudiness,
        ]
    }
}

impl fmt::Display for Precipitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precipitation {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| ParseCategoryError {
                kind: "precipitation",
                value: s.to_string(),
            })
    }
}

//! Record shapes returned by the OpenF1 endpoints.
//!
//! Field names follow the upstream JSON. Values the upstream leaves out or
//! sends as `null` for some rows are `Option`; descriptive strings and flags
//! that are only occasionally `null` decode to their default instead.
//! Unknown extra fields are ignored.

use chrono::DateTime;
use chrono::FixedOffset;
use serde::Deserialize;
use serde::Deserializer;

pub type Timestamp = DateTime<FixedOffset>;

// Some descriptive fields arrive as `null` on a few rows; one such row must
// not fail the whole response.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Session {
    pub session_key: u32,
    pub meeting_key: u32,
    pub session_name: String,
    pub session_type: String,
    pub date_start: Timestamp,
    pub date_end: Timestamp,
    pub gmt_offset: String,
    pub year: i32,
    pub circuit_key: u32,
    pub circuit_short_name: String,
    pub country_code: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Driver {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub broadcast_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name_acronym: String,
    pub last_name: Option<String>,
    pub country_code: Option<String>,
    pub headshot_url: Option<String>,
    pub team_name: Option<String>,
    /// Hex colour without the leading `#`.
    pub team_colour: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Lap {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub lap_number: u32,
    pub date_start: Option<Timestamp>,
    pub lap_duration: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_pit_out_lap: bool,
    pub duration_sector_1: Option<f64>,
    pub duration_sector_2: Option<f64>,
    pub duration_sector_3: Option<f64>,
    pub segments_sector_1: Option<Vec<Option<u32>>>,
    pub segments_sector_2: Option<Vec<Option<u32>>>,
    pub segments_sector_3: Option<Vec<Option<u32>>>,
    pub i1_speed: Option<u32>,
    pub i2_speed: Option<u32>,
    pub st_speed: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Position {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub date: Timestamp,
    pub position: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CarData {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub date: Timestamp,
    pub rpm: u32,
    pub speed: u32,
    pub n_gear: u8,
    pub throttle: u32,
    pub brake: u32,
    pub drs: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Stint {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub stint_number: u32,
    pub compound: Option<Compound>,
    pub tyre_age_at_start: Option<u32>,
    pub lap_start: Option<u32>,
    pub lap_end: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RaceControl {
    pub session_key: u32,
    pub meeting_key: u32,
    pub date: Timestamp,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    pub flag: Option<String>,
    pub lap_number: Option<u32>,
    pub driver_number: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TrackLocation {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub date: Timestamp,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Pit {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub date: Timestamp,
    pub lap_number: u32,
    pub pit_duration: Option<f64>,
}

/// A timing gap: seconds, or a lapped marker such as `"+1 LAP"`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Gap {
    Seconds(f64),
    Laps(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Interval {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub date: Timestamp,
    pub gap_to_leader: Option<Gap>,
    pub interval: Option<Gap>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TeamRadio {
    pub session_key: u32,
    pub meeting_key: u32,
    pub driver_number: u32,
    pub date: Timestamp,
    pub recording_url: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Overtake {
    pub session_key: u32,
    pub meeting_key: u32,
    pub date: Timestamp,
    pub overtaking_driver_number: u32,
    pub overtaken_driver_number: u32,
    pub position: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Weather {
    pub session_key: u32,
    pub meeting_key: u32,
    pub date: Timestamp,
    pub air_temperature: f64,
    pub track_temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub rainfall: f64,
    pub wind_direction: f64,
    pub wind_speed: f64,
}

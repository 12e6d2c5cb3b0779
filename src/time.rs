/// Wall-clock time arithmetic for the scheduling engine.
///
/// All appointment times are "HH:MM" strings within a single facility
/// time zone. Internally they are held as minute offsets from midnight.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("Invalid time format: '{0}'. Expected zero-padded HH:MM (00:00-23:59)")]
    InvalidTimeFormat(String),
}

/// A time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_hm(hours: u16, minutes: u16) -> Result<Self, TimeError> {
        if hours > 23 || minutes > 59 {
            return Err(TimeError::InvalidTimeFormat(format!(
                "{}:{}",
                hours, minutes
            )));
        }
        Ok(ClockTime(hours * 60 + minutes))
    }

    /// Build from a minute offset, wrapping around midnight.
    pub fn from_minutes(minutes: i64) -> Self {
        let wrapped = minutes.rem_euclid(MINUTES_PER_DAY as i64);
        ClockTime(wrapped as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Add minutes on a 24-hour clock. "23:50" + 30 is "00:20".
    pub fn add_minutes(self, minutes: i64) -> Self {
        ClockTime::from_minutes(self.0 as i64 + minutes.rem_euclid(MINUTES_PER_DAY as i64))
    }

    /// Add minutes without wrapping. `None` if the result reaches midnight.
    pub fn checked_add_minutes(self, minutes: u16) -> Option<Self> {
        let total = self.0.checked_add(minutes)?;
        if total >= MINUTES_PER_DAY {
            None
        } else {
            Some(ClockTime(total))
        }
    }
}

impl FromStr for ClockTime {
    type Err = TimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeError::InvalidTimeFormat(value.to_string());
        let bytes = value.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let hours = ((digits[0] - b'0') * 10 + (digits[1] - b'0')) as u16;
        let minutes = ((digits[2] - b'0') * 10 + (digits[3] - b'0')) as u16;
        ClockTime::from_hm(hours, minutes).map_err(|_| invalid())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for ClockTime {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

/// Add minutes to an "HH:MM" string, wrapping within 24 hours.
pub fn add_minutes(time: &str, minutes: i64) -> Result<String, TimeError> {
    let parsed: ClockTime = time.parse()?;
    Ok(parsed.add_minutes(minutes).to_string())
}

/// Half-open interval overlap: `[start_a, end_a)` against `[start_b, end_b)`.
///
/// Intervals that merely touch do not overlap.
pub fn overlaps<T: PartialOrd>(start_a: T, end_a: T, start_b: T, end_b: T) -> bool {
    start_a < end_b && start_b < end_a
}

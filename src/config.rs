/// Facility configuration for slot generation and alternative search.

use crate::time::{ClockTime, MINUTES_PER_DAY};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MAX_LOOKAHEAD_DAYS: u32 = 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Bookable window and search bounds.
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub open_time: ClockTime,
    pub close_time: ClockTime,
    pub slot_granularity_minutes: u16,
    pub lookahead_days: u32,
    pub max_alternatives: usize,
    /// Days from Monday (0) to Sunday (6) on which slots are offered.
    pub working_days: Vec<u32>,
    pub break_start: Option<ClockTime>,
    pub break_end: Option<ClockTime>,
    pub max_page_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            open_time: ClockTime::from_minutes(8 * 60),
            close_time: ClockTime::from_minutes(18 * 60),
            slot_granularity_minutes: 15,
            lookahead_days: 7,
            max_alternatives: 5,
            working_days: vec![0, 1, 2, 3, 4],
            break_start: None,
            break_end: None,
            max_page_size: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open_time >= self.close_time {
            return Err(ConfigError::Invalid(format!(
                "open time {} must be before close time {}",
                self.open_time, self.close_time
            )));
        }
        if self.slot_granularity_minutes == 0 || self.slot_granularity_minutes > MINUTES_PER_DAY {
            return Err(ConfigError::Invalid(format!(
                "slot granularity must be between 1 and {} minutes",
                MINUTES_PER_DAY
            )));
        }
        if self.lookahead_days > MAX_LOOKAHEAD_DAYS {
            return Err(ConfigError::Invalid(format!(
                "lookahead of {} days exceeds the maximum of {}",
                self.lookahead_days, MAX_LOOKAHEAD_DAYS
            )));
        }
        if let Some(day) = self.working_days.iter().find(|day| **day > 6) {
            return Err(ConfigError::Invalid(format!(
                "working day {} is out of range 0-6",
                day
            )));
        }
        match (self.break_start, self.break_end) {
            (Some(start), Some(end)) if start >= end => Err(ConfigError::Invalid(format!(
                "break start {} must be before break end {}",
                start, end
            ))),
            (Some(_), None) | (None, Some(_)) => Err(ConfigError::Invalid(
                "break start and break end must be set together".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days
            .contains(&date.weekday().num_days_from_monday())
    }

    pub fn break_window(&self) -> Option<(ClockTime, ClockTime)> {
        self.break_start.zip(self.break_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SchedulerConfig::from_json_str(
            r#"{ "openTime": "09:00", "breakStart": "12:00", "breakEnd": "13:00" }"#,
        )
        .unwrap();
        assert_eq!(config.open_time.to_string(), "09:00");
        assert_eq!(config.close_time.to_string(), "18:00");
        assert_eq!(config.slot_granularity_minutes, 15);
        assert_eq!(config.break_window().map(|(s, _)| s.to_string()), Some("12:00".to_string()));
    }

    #[test]
    fn rejects_inverted_window() {
        let err = SchedulerConfig::from_json_str(r#"{ "openTime": "18:00", "closeTime": "08:00" }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_granularity_and_lookahead() {
        for raw in [
            r#"{ "slotGranularityMinutes": 0 }"#,
            r#"{ "slotGranularityMinutes": 65535 }"#,
            r#"{ "lookaheadDays": 4294967295 }"#,
        ] {
            let err = SchedulerConfig::from_json_str(raw).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{raw} should be rejected");
        }
        assert!(SchedulerConfig::from_json_str(r#"{ "lookaheadDays": 366 }"#).is_ok());
    }

    #[test]
    fn rejects_half_configured_break() {
        let err = SchedulerConfig::from_json_str(r#"{ "breakStart": "12:00" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_time_strings() {
        let err = SchedulerConfig::from_json_str(r#"{ "openTime": "8am" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn weekends_are_closed_by_default() {
        let config = SchedulerConfig::default();
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
        assert!(config.is_working_day(monday));
        assert!(!config.is_working_day(saturday));
    }
}

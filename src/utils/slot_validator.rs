// utils/slot_validator.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use thiserror::Error;
use validator::ValidationError;

/// Errors that can occur while checking proposed meetup slots
#[derive(Error, Debug, PartialEq)]
pub enum SlotError {
    #[error("Date '{0}' must be a calendar date in YYYY-MM-DD format")]
    BadDate(String),
    #[error("Time '{0}' must be a 24h time in HH:MM format")]
    BadTime(String),
    #[error("Slot '{0}' appears more than once")]
    Duplicate(String),
    #[error("At most {} slots may be proposed, got {}", MAX_SLOTS, .0)]
    TooMany(usize),
}

/// Upper bound on proposed dates and on proposed times.
pub const MAX_SLOTS: usize = 30;

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static TIME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap());

pub struct SlotValidator;

impl SlotValidator {
    /// Accepts only real dates; `2025-02-30` matches the pattern but is rejected.
    pub fn check_date(value: &str) -> Result<NaiveDate, SlotError> {
        if !DATE_REGEX.is_match(value) {
            return Err(SlotError::BadDate(value.to_string()));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| SlotError::BadDate(value.to_string()))
    }

    pub fn check_time(value: &str) -> Result<(), SlotError> {
        if TIME_REGEX.is_match(value) {
            Ok(())
        } else {
            Err(SlotError::BadTime(value.to_string()))
        }
    }

    fn check_unique(values: &[String]) -> Result<(), SlotError> {
        let mut seen = HashSet::with_capacity(values.len());
        for value in values {
            if !seen.insert(value.as_str()) {
                return Err(SlotError::Duplicate(value.clone()));
            }
        }
        Ok(())
    }

    fn check_count(values: &[String]) -> Result<(), SlotError> {
        if values.len() > MAX_SLOTS {
            return Err(SlotError::TooMany(values.len()));
        }
        Ok(())
    }

    pub fn check_dates(values: &[String]) -> Result<(), SlotError> {
        Self::check_count(values)?;
        values.iter().try_for_each(|v| Self::check_date(v).map(|_| ()))?;
        Self::check_unique(values)
    }

    pub fn check_times(values: &[String]) -> Result<(), SlotError> {
        Self::check_count(values)?;
        values.iter().try_for_each(|v| Self::check_time(v))?;
        Self::check_unique(values)
    }
}

fn to_validation_error(code: &'static str, err: SlotError) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(err.to_string()));
    error
}

pub fn validate_date_list(values: &[String]) -> Result<(), ValidationError> {
    SlotValidator::check_dates(values).map_err(|e| to_validation_error("dates", e))
}

pub fn validate_time_list(values: &[String]) -> Result<(), ValidationError> {
    SlotValidator::check_times(values).map_err(|e| to_validation_error("times", e))
}

pub fn validate_date_value(value: &str) -> Result<(), ValidationError> {
    SlotValidator::check_date(value)
        .map(|_| ())
        .map_err(|e| to_validation_error("date", e))
}

pub fn validate_time_value(value: &str) -> Result<(), ValidationError> {
    SlotValidator::check_time(value).map_err(|e| to_validation_error("time", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_exist_on_the_calendar() {
        assert!(SlotValidator::check_date("2025-06-01").is_ok());
        assert!(SlotValidator::check_date("2024-02-29").is_ok());
        assert_eq!(
            SlotValidator::check_date("2025-02-29"),
            Err(SlotError::BadDate("2025-02-29".into()))
        );
        assert!(SlotValidator::check_date("2025-6-1").is_err());
        assert!(SlotValidator::check_date("").is_err());
    }

    #[test]
    fn times_are_24h() {
        assert!(SlotValidator::check_time("00:00").is_ok());
        assert!(SlotValidator::check_time("23:59").is_ok());
        assert!(SlotValidator::check_time("24:00").is_err());
        assert!(SlotValidator::check_time("9:00").is_err());
        assert!(SlotValidator::check_time("09:00:00").is_err());
    }

    #[test]
    fn duplicates_are_rejected() {
        let dates = vec!["2025-06-01".to_string(), "2025-06-01".to_string()];
        assert_eq!(
            SlotValidator::check_dates(&dates),
            Err(SlotError::Duplicate("2025-06-01".into()))
        );
        assert!(SlotValidator::check_times(&[]).is_ok());
    }

    #[test]
    fn validation_error_carries_message() {
        let err = validate_time_value("noon").unwrap_err();
        assert_eq!(err.code, "time");
        assert!(err.message.unwrap().contains("noon"));
    }

    #[test]
    fn slot_lists_are_bounded() {
        let dates: Vec<String> = (1..=31).map(|d| format!("2025-07-{:02}", d)).collect();
        assert_eq!(SlotValidator::check_dates(&dates), Err(SlotError::TooMany(31)));
        assert!(SlotValidator::check_dates(&dates[..MAX_SLOTS]).is_ok());

        let times: Vec<String> = (0..40).map(|m| format!("10:{:02}", m)).collect();
        assert_eq!(SlotValidator::check_times(&times), Err(SlotError::TooMany(40)));
        assert!(validate_time_list(&times).is_err());
    }
}

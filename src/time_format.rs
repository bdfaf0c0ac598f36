//! Conversion between 24-hour slot labels (`"17:00"`) and the 12-hour
//! labels shown for bookings (`"5:00 PM"`).

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

use crate::error::{Result, ScheduleError};

const FORMAT_24: &str = "HH:MM";
const FORMAT_12: &str = "H:MM AM|PM";

lazy_static! {
    static ref TIME_24: Regex = Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").unwrap();
    static ref TIME_12: Regex = Regex::new(r"^(1[0-2]|[1-9]):([0-5]\d) (AM|PM)$").unwrap();
}

pub fn to_12_hour(time24: &str) -> Result<String> {
    let captures = TIME_24
        .captures(time24)
        .ok_or_else(|| invalid(time24, FORMAT_24))?;
    let hour: u32 = captures[1]
        .parse()
        .map_err(|_| invalid(time24, FORMAT_24))?;
    let minutes = &captures[2];

    let (hour, period) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    Ok(format!("{hour}:{minutes} {period}"))
}

pub fn to_24_hour(time12: &str) -> Result<String> {
    let captures = TIME_12
        .captures(time12)
        .ok_or_else(|| invalid(time12, FORMAT_12))?;
    let hour: u32 = captures[1]
        .parse()
        .map_err(|_| invalid(time12, FORMAT_12))?;
    let minutes = &captures[2];

    let hour = match (hour, &captures[3]) {
        (12, "AM") => 0,
        (12, _) => 12,
        (hour, "AM") => hour,
        (hour, _) => hour + 12,
    };
    Ok(format!("{hour:02}:{minutes}"))
}

/// Brings a label into 24-hour form for matching. Labels that are neither
/// 12- nor 24-hour are returned unchanged and only match verbatim.
pub fn normalize(time: &str) -> Cow<'_, str> {
    match to_24_hour(time) {
        Ok(time24) => Cow::Owned(time24),
        Err(_) => Cow::Borrowed(time),
    }
}

pub fn is_valid_label(time: &str) -> bool {
    TIME_24.is_match(time) || TIME_12.is_match(time)
}

fn invalid(input: &str, expected: &'static str) -> ScheduleError {
    ScheduleError::InvalidTimeFormat {
        input: input.to_string(),
        expected,
    }
}

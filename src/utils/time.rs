//! Time parsing for command-line input

use crate::domain::model::Time;
use crate::error::{ClipMarkError, ClipMarkResult};

/// Parser for user-supplied timestamps and ranges
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeParser;

impl TimeParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `HH:MM:SS(.fff)`, `MM:SS(.fff)` or plain seconds (`12.5`)
    pub fn parse_time(&self, time_str: &str) -> ClipMarkResult<Time> {
        let trimmed = time_str.trim();
        let invalid = || ClipMarkError::InvalidTimeFormat {
            time: time_str.to_string(),
        };

        let parts: Vec<&str> = trimmed.split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [seconds] => ("0", "0", *seconds),
            [minutes, seconds] => ("0", *minutes, *seconds),
            [hours, minutes, seconds] => (*hours, *minutes, *seconds),
            _ => return Err(invalid()),
        };

        let hours = parse_whole(hours).ok_or_else(invalid)?;
        let minutes = parse_whole(minutes).ok_or_else(invalid)?;
        let millis = parse_seconds(seconds).ok_or_else(invalid)?;

        // Only the leading field may exceed its clock range
        if parts.len() >= 2 && millis >= 60_000 {
            return Err(invalid());
        }
        if parts.len() == 3 && minutes >= 60 {
            return Err(invalid());
        }

        Time::checked_from_hms(hours, minutes, 0, millis).ok_or_else(invalid)
    }

    /// Parse `start-end` or `start..end`; start must be before end
    pub fn parse_range(&self, range: &str) -> ClipMarkResult<(Time, Time)> {
        let (start, end) = range
            .split_once("..")
            .or_else(|| range.split_once('-'))
            .ok_or_else(|| ClipMarkError::InvalidTimeFormat {
                time: range.to_string(),
            })?;

        let start = self.parse_time(start)?;
        let end = self.parse_time(end)?;
        if start >= end {
            return Err(ClipMarkError::InvalidTimeRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok((start, end))
    }
}

fn parse_whole(field: &str) -> Option<i64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// `"5"` -> 5000, `"5.25"` -> 5250; digits past milliseconds are dropped
fn parse_seconds(field: &str) -> Option<i64> {
    let (whole, fraction) = match field.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (field, ""),
    };
    let whole = if whole.is_empty() && !fraction.is_empty() {
        0
    } else {
        parse_whole(whole)?
    };
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut millis = 0;
    let mut scale = 100;
    for digit in fraction.bytes().take(3) {
        millis += i64::from(digit - b'0') * scale;
        scale /= 10;
    }
    whole.checked_mul(1000)?.checked_add(millis)
}

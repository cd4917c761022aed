//! Encoder progress extraction
//!
//! ffmpeg reports `time=HH:MM:SS.ff` on its status line, usually on stderr
//! and separated by carriage returns rather than newlines, so output is
//! scanned chunk by chunk instead of line by line.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::model::Time;

fn time_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| {
            Regex::new(r"time\s*[=:]\s*(-?)(\d+):(\d{1,2}):(\d{1,2})(?:[.,](\d+))?").ok()
        })
        .as_ref()
}

/// Scan `chunk` for encoder time markers and return the last one, clamped
/// to `[0, target]`. Returns `None` when the chunk carries no marker.
///
/// Encoders emit monotonically increasing timestamps, so earlier markers in
/// the same chunk are superseded by the last.
pub fn parse_progress(chunk: &str, target: Time) -> Option<Time> {
    let captures = time_marker()?.captures_iter(chunk).last()?;

    let field = |index: usize| -> Option<i64> {
        captures.get(index)?.as_str().parse::<i64>().ok()
    };
    let millis = captures
        .get(5)
        .map(|m| fraction_to_millis(m.as_str()))
        .unwrap_or(0);

    // a marker too large to represent is noise, not progress
    let magnitude = Time::checked_from_hms(field(2)?, field(3)?, field(4)?, millis)?;
    let negative = captures.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
    let elapsed = if negative { Time::ZERO - magnitude } else { magnitude };

    Some(elapsed.clamp(Time::ZERO, target))
}

/// `"5"` -> 500, `"05"` -> 50, `"123456"` -> 123
fn fraction_to_millis(digits: &str) -> i64 {
    let mut millis = 0;
    let mut scale = 100;
    for digit in digits.chars().take(3) {
        millis += digit.to_digit(10).unwrap_or(0) as i64 * scale;
        scale /= 10;
    }
    millis
}

//! Date-window parsing for the run command and `published_at` timestamps.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

use crate::error::AnnotateError;

const DATE_ONLY: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");
const DATETIME_NAIVE: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Parse a window bound like `7d`, `2w`, `12h`, `45m`, `30s`, `2024-01-01`,
/// or a full ISO-8601 timestamp (trailing `Z` accepted). Relative values are
/// subtracted from the current UTC time.
pub fn parse_since(value: &str) -> Result<OffsetDateTime, AnnotateError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AnnotateError::InvalidArgument(
            "Since value cannot be empty".into(),
        ));
    }

    if let Some(dt) = parse_iso(v) {
        return Ok(dt);
    }

    let digits: String = v.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(AnnotateError::InvalidArgument(format!(
            "Invalid since value: '{value}' - no number found"
        )));
    }
    let n: i64 = digits
        .parse()
        .map_err(|_| AnnotateError::InvalidArgument(format!("Invalid since value: '{value}'")))?;
    let unit = v[digits.len()..].trim().to_ascii_lowercase();

    let delta = match unit.as_str() {
        "" | "d" | "day" | "days" => Duration::days(n),
        "w" | "week" | "weeks" => Duration::weeks(n),
        "h" | "hour" | "hours" => Duration::hours(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::minutes(n),
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::seconds(n),
        other => {
            return Err(AnnotateError::InvalidArgument(format!(
                "Invalid since value: '{value}' - unknown unit '{other}'"
            )));
        }
    };
    Ok(OffsetDateTime::now_utc() - delta)
}

/// Parse a candidate `published_at` timestamp; malformed values yield `None`.
pub fn parse_published_at(value: &str) -> Option<OffsetDateTime> {
    parse_iso(value.trim())
}

fn parse_iso(v: &str) -> Option<OffsetDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(v, &Rfc3339) {
        return Some(dt);
    }
    let naive = v.strip_suffix('Z').unwrap_or(v);
    if let Ok(dt) = PrimitiveDateTime::parse(naive, DATETIME_NAIVE) {
        return Some(dt.assume_utc());
    }
    if let Ok(date) = Date::parse(naive, DATE_ONLY) {
        return Some(date.midnight().assume_utc());
    }
    None
}

//! Turns the server's repeat timestamp / minute count into a bucketed label.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::DEFAULT_REPEAT_INTERVAL_MINUTES;

/// Placeholder the vendor sends instead of null.
pub const ZERO_DATE: &str = "0000-00-00 00:00:00+00";

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 1_440;
const MINUTES_PER_WEEK: i64 = 10_080;
const MINUTES_PER_MONTH: i64 = 43_200;
const MINUTES_PER_YEAR: i64 = 525_600;
const HOURS_BUCKET_THRESHOLD: i64 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "unit", content = "amount")]
pub enum DisplayLabel {
    Years(i64),
    Months(i64),
    Weeks(i64),
    Days(i64),
    Hours(i64),
    AboutSixHours,
}

impl DisplayLabel {
    /// Upper bound of the bucket in minutes, used for ordering.
    pub fn approx_minutes(&self) -> i64 {
        match *self {
            Self::Years(n) => n * MINUTES_PER_YEAR,
            Self::Months(n) => n * MINUTES_PER_MONTH,
            Self::Weeks(n) => n * MINUTES_PER_WEEK,
            Self::Days(n) => n * MINUTES_PER_DAY,
            Self::Hours(n) => n * MINUTES_PER_HOUR,
            Self::AboutSixHours => 6 * MINUTES_PER_HOUR,
        }
    }
}

impl fmt::Display for DisplayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (arrow, n, unit) = match *self {
            Self::Years(n) => ("↑", n, "year"),
            Self::Months(n) => ("↑", n, "month"),
            Self::Weeks(n) => ("↑", n, "week"),
            Self::Days(n) => ("↑", n, "day"),
            Self::Hours(n) => ("↓", n, "hour"),
            Self::AboutSixHours => return f.write_str("~6 hours"),
        };
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "{arrow} {n} {unit}{plural}")
    }
}

/// Buckets a raw minute count on the fixed threshold table.
pub fn bucket_minutes(minutes: i64) -> DisplayLabel {
    if minutes >= MINUTES_PER_YEAR {
        DisplayLabel::Years(minutes / MINUTES_PER_YEAR)
    } else if minutes >= MINUTES_PER_MONTH {
        DisplayLabel::Months(minutes / MINUTES_PER_MONTH)
    } else if minutes >= MINUTES_PER_WEEK {
        DisplayLabel::Weeks(minutes / MINUTES_PER_WEEK)
    } else if minutes >= MINUTES_PER_DAY {
        DisplayLabel::Days(minutes / MINUTES_PER_DAY)
    } else if minutes >= HOURS_BUCKET_THRESHOLD {
        DisplayLabel::Hours(minutes / MINUTES_PER_HOUR)
    } else {
        DisplayLabel::AboutSixHours
    }
}

pub fn label(repeat_at: Option<&str>, repeat_interval_minutes: Option<i64>) -> DisplayLabel {
    label_at(repeat_at, repeat_interval_minutes, Utc::now())
}

/// Absolute timestamp wins when present; otherwise the minute count is
/// bucketed. An unparseable timestamp is logged and treated as absent.
pub fn label_at(
    repeat_at: Option<&str>,
    repeat_interval_minutes: Option<i64>,
    now: DateTime<Utc>,
) -> DisplayLabel {
    let minutes = repeat_interval_minutes.unwrap_or(DEFAULT_REPEAT_INTERVAL_MINUTES);

    let raw = match repeat_at.map(str::trim) {
        Some(s) if !s.is_empty() && !is_zero_date(s) => s,
        _ => return bucket_minutes(minutes),
    };

    let Some(at) = parse_repeat_at(raw) else {
        tracing::warn!(repeat_at = raw, "Malformed repeat date, using minute interval");
        return bucket_minutes(minutes);
    };

    let delta = at - now;
    if delta <= chrono::Duration::zero() {
        DisplayLabel::AboutSixHours
    } else if delta.num_days() >= 1 {
        DisplayLabel::Days(delta.num_days())
    } else {
        DisplayLabel::Hours(delta.num_hours().max(1))
    }
}

fn is_zero_date(s: &str) -> bool {
    s == ZERO_DATE || s.starts_with("0000-00-00")
}

/// Accepts `2025-10-21 19:00:00+00`, RFC 3339 and naive timestamps (as UTC).
pub fn parse_repeat_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

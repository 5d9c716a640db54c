//! Timestamp formatting for the DATE column.
//!
//! A [`TimeFormatter`] is configured once before rendering starts and then
//! formats every event's timestamp the same way.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// How timestamps are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeStyle {
    /// Human readable durations, e.g. "About an hour ago"
    #[default]
    Relative,
    /// RFC3339 timestamps with second precision, e.g. "2024-03-01T12:00:00Z"
    Timestamp,
}

/// Formats event timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFormatter {
    style: TimeStyle,
    /// Fixed reference point for relative durations (wall clock if `None`)
    reference: Option<DateTime<Utc>>,
}

impl TimeFormatter {
    /// Create a formatter; `use_timestamps` selects [`TimeStyle::Timestamp`]
    #[must_use]
    pub fn new(use_timestamps: bool) -> Self {
        let style = if use_timestamps {
            TimeStyle::Timestamp
        } else {
            TimeStyle::Relative
        };
        Self::with_style(style)
    }

    /// Create a formatter with an explicit style
    #[must_use]
    pub const fn with_style(style: TimeStyle) -> Self {
        Self {
            style,
            reference: None,
        }
    }

    /// Measure relative durations against `now` instead of the wall clock
    #[must_use]
    pub fn relative_to(mut self, now: DateTime<Utc>) -> Self {
        self.reference = Some(now);
        self
    }

    /// Get the style
    #[must_use]
    pub const fn style(&self) -> TimeStyle {
        self.style
    }

    /// Format a timestamp
    #[must_use]
    pub fn format(&self, at: DateTime<Utc>) -> String {
        match self.style {
            TimeStyle::Timestamp => at.to_rfc3339_opts(SecondsFormat::Secs, true),
            TimeStyle::Relative => {
                let now = self.reference.unwrap_or_else(Utc::now);
                let elapsed = now.signed_duration_since(at).num_seconds();
                if elapsed < 0 {
                    format!("{} from now", human_duration(-elapsed))
                } else {
                    format!("{} ago", human_duration(elapsed))
                }
            }
        }
    }
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::with_style(TimeStyle::default())
    }
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Human readable description of a non-negative number of seconds
fn human_duration(seconds: i64) -> String {
    let minutes = seconds / MINUTE;
    // hours are rounded to the nearest whole hour
    let hours = (seconds + HOUR / 2) / HOUR;

    if seconds < 1 {
        "Less than a second".to_string()
    } else if seconds == 1 {
        "1 second".to_string()
    } else if seconds < MINUTE {
        format!("{} seconds", seconds)
    } else if minutes == 1 {
        "About a minute".to_string()
    } else if minutes < 60 {
        format!("{} minutes", minutes)
    } else if hours == 1 {
        "About an hour".to_string()
    } else if hours < 48 {
        format!("{} hours", hours)
    } else if hours < 24 * 7 * 2 {
        format!("{} days", seconds / DAY)
    } else if hours < 24 * 30 * 2 {
        format!("{} weeks", seconds / (7 * DAY))
    } else if hours < 24 * 365 * 2 {
        format!("{} months", seconds / (30 * DAY))
    } else {
        format!("{} years", seconds / (365 * DAY))
    }
}

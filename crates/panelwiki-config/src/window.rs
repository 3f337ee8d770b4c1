//! Time windows
//!
//! A window is given on the command line as `<tag>__&from=<epoch>&to=<epoch>`;
//! the tag prefix is optional.

use crate::error::WindowError;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use panelwiki_artifact::{sanitize_component, KEY_SEPARATOR};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{Entry, HashMap};
use std::sync::OnceLock;

/// Format of the human-readable window bounds
pub const HUMAN_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Separator between the tag and the query part
const TAG_SEPARATOR: &str = "__";

/// Epoch values with at most this many digits are seconds
const SECONDS_MAX_DIGITS: usize = 10;

fn bound_regex() -> &'static Regex {
    static BOUND: OnceLock<Regex> = OnceLock::new();
    BOUND.get_or_init(|| Regex::new(r"&(from|to)=(\d+)").expect("window bound pattern is valid"))
}

/// One requested time range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Label used for grouping and directory names
    pub tag: String,
    /// Position on the command line (0-based)
    pub index: usize,
    /// Start, epoch milliseconds
    pub start_ms: i64,
    /// End, epoch milliseconds
    pub end_ms: i64,
    /// Start rendered in the run timezone
    pub start_human: String,
    /// End rendered in the run timezone
    pub end_human: String,
}

impl TimeWindow {
    /// Parse one CLI value
    ///
    /// # Errors
    /// Returns [`WindowError`] if a bound is missing, out of range, or the
    /// range is empty.
    pub fn parse(raw: &str, index: usize, tz: Tz) -> Result<Self, WindowError> {
        let tag = match raw.split_once(TAG_SEPARATOR) {
            Some((tag, _)) if !tag.trim().is_empty() => tag.trim().to_string(),
            _ => format!("Test {}", index + 1),
        };

        let start_ms = epoch_ms(raw, "from")?;
        let end_ms = epoch_ms(raw, "to")?;
        if start_ms >= end_ms {
            return Err(WindowError::EmptyRange {
                raw: raw.to_string(),
                start_ms,
                end_ms,
            });
        }

        Ok(Self {
            tag,
            index,
            start_ms,
            end_ms,
            start_human: human(raw, start_ms, tz)?,
            end_human: human(raw, end_ms, tz)?,
        })
    }

    /// Human-readable `start - end`
    #[must_use]
    pub fn human_range(&self) -> String {
        format!("{} - {}", self.start_human, self.end_human)
    }
}

/// Parse every CLI value in order
///
/// A repeated tag is accepted; the later window overwrites the earlier one's
/// images on disk, which is logged. Distinct tags that share a directory name
/// are rejected.
///
/// # Errors
/// Returns the first [`WindowError`].
pub fn parse_windows(raws: &[String], tz: Tz) -> Result<Vec<TimeWindow>, WindowError> {
    let mut dir_names: HashMap<String, String> = HashMap::new();
    let mut windows = Vec::with_capacity(raws.len());
    for (index, raw) in raws.iter().enumerate() {
        let window = TimeWindow::parse(raw, index, tz)?;
        let dir = sanitize_component(&window.tag).to_lowercase();
        if dir.contains(KEY_SEPARATOR) {
            return Err(WindowError::ReservedSeparator(window.tag));
        }
        match dir_names.entry(dir) {
            Entry::Occupied(first) if *first.get() == window.tag => tracing::warn!(
                "Duplicate window tag '{}': later captures overwrite earlier ones",
                window.tag
            ),
            Entry::Occupied(first) => {
                return Err(WindowError::TagCollision {
                    first: first.get().clone(),
                    second: window.tag,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(window.tag.clone());
            }
        }
        windows.push(window);
    }
    Ok(windows)
}

/// Parse an IANA timezone name
///
/// # Errors
/// Returns [`WindowError::UnknownTimezone`] for unknown names.
pub fn parse_timezone(name: &str) -> Result<Tz, WindowError> {
    name.parse::<Tz>()
        .map_err(|_| WindowError::UnknownTimezone(name.to_string()))
}

fn epoch_ms(raw: &str, bound: &'static str) -> Result<i64, WindowError> {
    let digits = bound_regex()
        .captures_iter(raw)
        .find(|c| &c[1] == bound)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
        .ok_or_else(|| WindowError::MissingBound {
            raw: raw.to_string(),
            bound,
        })?;

    let out_of_range = || WindowError::OutOfRange {
        raw: raw.to_string(),
        value: digits.to_string(),
    };
    let value: i64 = digits.parse().map_err(|_| out_of_range())?;
    if digits.trim_start_matches('0').len() <= SECONDS_MAX_DIGITS {
        value.checked_mul(1000).ok_or_else(out_of_range)
    } else {
        Ok(value)
    }
}

fn human(raw: &str, ms: i64, tz: Tz) -> Result<String, WindowError> {
    let utc: DateTime<Utc> =
        DateTime::from_timestamp_millis(ms).ok_or_else(|| WindowError::OutOfRange {
            raw: raw.to_string(),
            value: ms.to_string(),
        })?;
    Ok(tz
        .from_utc_datetime(&utc.naive_utc())
        .format(HUMAN_TIME_FORMAT)
        .to_string())
}

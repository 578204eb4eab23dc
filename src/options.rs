//! Filter options and their value grammars
//!
//! The option surface is a bag of optional strings keyed by the engine's
//! option names. `None` means the option was not supplied; `Some("")` is how
//! flag-style options arrive. Value-bearing options are parsed lazily by the
//! operation that consumes them, so an unused malformed value still errors
//! the moment its operation runs, naming the option.

use std::ops::Range;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::{Regex, RegexBuilder};

use crate::model::Fix;
use crate::{FilterError, Result};

/// Seconds per calendar day and hour, for the duration grammars.
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;

/// Meters per statute mile, for the distance grammar.
const METERS_PER_MILE: f64 = 1_609.344;

/// The user-selected options for one filtering pass.
///
/// Field names follow the engine's option names, except `move_by` which
/// carries the option named `move` (a Rust keyword).
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterOptions {
    /// Keep only tracks whose name matches this case-insensitive shell glob.
    pub name: Option<String>,
    /// New track title, or a strftime-style template when it contains `%`.
    pub title: Option<String>,
    /// Shift every creation time by this signed duration (`Nd|h|m|s`).
    pub move_by: Option<String>,
    /// Concatenate non-overlapping tracks into one (flag; also the default
    /// when no options at all are supplied).
    pub pack: Option<String>,
    /// Interleave all tracks into one chronologically sorted track (flag).
    pub merge: Option<String>,
    /// With `merge`: silently drop points without timestamps (flag).
    pub discard: Option<String>,
    /// Split one track on calendar dates (flag) or on an elapsed-time
    /// threshold (`Nd|h|m|s`, fractions allowed).
    pub split: Option<String>,
    /// Split one track on a distance threshold (`Nk|m`).
    pub sdistance: Option<String>,
    /// Keep only points at or after this partial UTC timestamp.
    pub start: Option<String>,
    /// Keep only points at or before this partial UTC timestamp.
    pub stop: Option<String>,
    /// Rewrite missing (or, with `f`, all) timestamps: `f?BASE(+STEP)?`.
    pub faketime: Option<String>,
    /// Fix quality to stamp on every point: `pps|dgps|3d|2d|none`.
    pub fix: Option<String>,
    /// Synthesize course over ground from positions (flag).
    pub course: Option<String>,
    /// Synthesize speed from positions and times (flag).
    pub speed: Option<String>,
    /// Promote interior segments to tracks of their own (flag).
    pub seg2trk: Option<String>,
    /// Demote all tracks to segments of the first one (flag).
    pub trk2seg: Option<String>,
    /// Denoise stationary points and mark segment breaks on distance jumps
    /// (flag).
    pub segment: Option<String>,
    /// Delete tracks with fewer waypoints than this.
    pub minpoints: Option<String>,
}

impl FilterOptions {
    /// Number of options the user supplied.
    pub fn count(&self) -> usize {
        let present = [
            self.name.is_some(),
            self.title.is_some(),
            self.move_by.is_some(),
            self.pack.is_some(),
            self.merge.is_some(),
            self.discard.is_some(),
            self.split.is_some(),
            self.sdistance.is_some(),
            self.start.is_some(),
            self.stop.is_some(),
            self.faketime.is_some(),
            self.fix.is_some(),
            self.course.is_some(),
            self.speed.is_some(),
            self.seg2trk.is_some(),
            self.trk2seg.is_some(),
            self.segment.is_some(),
            self.minpoints.is_some(),
        ];
        present.iter().filter(|&&p| p).count()
    }
}

/// A parsed `faketime` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeTime {
    /// Overwrite valid timestamps too, not only missing ones.
    pub force: bool,
    /// First timestamp to assign.
    pub start: DateTime<Utc>,
    /// Seconds to advance after each assignment.
    pub step: i64,
}

fn invalid(option: &'static str, value: &str, reason: impl Into<String>) -> FilterError {
    FilterError::InvalidOption {
        option,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // ([+-]?\d+) - signed integer quantity
        // ([dhms])   - unit: days, hours, minutes, seconds
        Regex::new(r"(?i)^([+-]?\d+)([dhms])$").unwrap()
    })
}

fn fractional_duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // ([+-]?(?:\d+(?:\.\d*)?|\.\d+)) - signed decimal quantity
        // ([dhms])                       - unit as above
        Regex::new(r"(?i)^([+-]?(?:\d+(?:\.\d*)?|\.\d+))([dhms])$").unwrap()
    })
}

fn distance_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // ([+-]?(?:\d+(?:\.\d*)?|\.\d+)) - signed decimal quantity
        // ([km])                         - unit: kilometers or statute miles
        Regex::new(r"(?i)^([+-]?(?:\d+(?:\.\d*)?|\.\d+))([km])$").unwrap()
    })
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Up to 14 digits, a prefix of YYYYMMDDHHMMSS
        Regex::new(r"^(\d{0,14})$").unwrap()
    })
}

fn faketime_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // (f?)           - force flag
        // (\d{0,14})     - base timestamp, a prefix of YYYYMMDDHHMMSS
        // (?:\+(\d{1,10}))? - optional step in seconds
        Regex::new(r"^(f?)(\d{0,14})(?:\+(\d{1,10}))?$").unwrap()
    })
}

/// Parse a whole-second duration such as `-30m` or `2D` into signed seconds.
pub(crate) fn parse_duration(option: &'static str, value: &str) -> Result<i64> {
    let caps = duration_pattern()
        .captures(value)
        .ok_or_else(|| invalid(option, value, "expected a signed integer followed by d, h, m or s"))?;

    let quantity: i64 = caps[1]
        .parse()
        .map_err(|_| invalid(option, value, "quantity out of range"))?;
    let scale = match caps[2].chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('d') => SECONDS_PER_DAY,
        Some('h') => SECONDS_PER_HOUR,
        Some('m') => 60,
        _ => 1,
    };

    quantity
        .checked_mul(scale)
        .ok_or_else(|| invalid(option, value, "quantity out of range"))
}

/// Parse a fractional duration such as `1.5h` into positive seconds.
pub(crate) fn parse_fractional_duration(option: &'static str, value: &str) -> Result<f64> {
    let caps = fractional_duration_pattern()
        .captures(value)
        .ok_or_else(|| invalid(option, value, "expected a number followed by d, h, m or s"))?;

    let quantity: f64 = caps[1]
        .parse()
        .map_err(|_| invalid(option, value, "not a number"))?;
    if quantity <= 0.0 {
        return Err(invalid(option, value, "must be a positive number"));
    }
    let scale = match caps[2].chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('d') => SECONDS_PER_DAY as f64,
        Some('h') => SECONDS_PER_HOUR as f64,
        Some('m') => 60.0,
        _ => 1.0,
    };

    Ok(quantity * scale)
}

/// Parse a distance such as `5k` or `.5m` into positive meters.
pub(crate) fn parse_distance(option: &'static str, value: &str) -> Result<f64> {
    let caps = distance_pattern()
        .captures(value)
        .ok_or_else(|| invalid(option, value, "expected a number followed by k (kilometers) or m (miles)"))?;

    let quantity: f64 = caps[1]
        .parse()
        .map_err(|_| invalid(option, value, "not a number"))?;
    if quantity <= 0.0 {
        return Err(invalid(option, value, "must be a positive number"));
    }
    let scale = match caps[2].chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('k') => 1_000.0,
        _ => METERS_PER_MILE,
    };

    Ok(quantity * scale)
}

/// Fold a slice of ASCII digits into an integer.
fn digits(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

/// Interpret `value` as a prefix of `YYYYMMDDHHMMSS`; the unspecified tail
/// defaults to `00000101000000`, so an empty string yields year 0, Jan 1.
fn timestamp_from_prefix(option: &'static str, value: &str, prefix: &str) -> Result<DateTime<Utc>> {
    let mut padded = *b"00000101000000";
    padded[..prefix.len()].copy_from_slice(prefix.as_bytes());

    let field = |range: Range<usize>| digits(&padded[range]);
    let year = field(0..4) as i32;
    let (month, day) = (field(4..6), field(6..8));
    let (hour, minute, second) = (field(8..10), field(10..12), field(12..14));

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| invalid(option, value, "not a valid calendar date and time"))
}

/// Parse a partial UTC timestamp (`start` / `stop` grammar).
pub(crate) fn parse_partial_timestamp(option: &'static str, value: &str) -> Result<DateTime<Utc>> {
    let caps = timestamp_pattern()
        .captures(value)
        .ok_or_else(|| invalid(option, value, "expected up to 14 digits of YYYYMMDDHHMMSS"))?;
    timestamp_from_prefix(option, value, &caps[1])
}

/// Parse the `faketime` grammar `f?BASE(+STEP)?`.
pub(crate) fn parse_faketime(value: &str) -> Result<FakeTime> {
    const OPTION: &str = "faketime";
    let caps = faketime_pattern()
        .captures(value)
        .ok_or_else(|| invalid(OPTION, value, "expected f?TIMESTAMP(+STEP)?"))?;

    let force = !caps[1].is_empty();
    let start = timestamp_from_prefix(OPTION, value, &caps[2])?;
    let step = match caps.get(3) {
        Some(step) => step
            .as_str()
            .parse()
            .map_err(|_| invalid(OPTION, value, "step out of range"))?,
        None => 0,
    };

    Ok(FakeTime { force, start, step })
}

/// Parse the `fix` grammar; returns the fix kind and the satellite count to
/// suggest for points that report none.
pub(crate) fn parse_fix_kind(value: &str) -> Result<(Fix, u32)> {
    let lowered = value.to_ascii_lowercase();
    match lowered.as_str() {
        "pps" => Ok((Fix::Pps, 4)),
        "dgps" => Ok((Fix::Dgps, 4)),
        "3d" => Ok((Fix::ThreeDimensional, 4)),
        "2d" => Ok((Fix::TwoDimensional, 3)),
        "none" => Ok((Fix::None, 0)),
        _ => Err(invalid("fix", value, "expected pps, dgps, 3d, 2d or none")),
    }
}

/// Compile a case-insensitive shell glob (`*`, `?`) into an anchored regex
/// for the track name filter.
pub(crate) fn compile_name_glob(pattern: &str) -> Result<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');

    RegexBuilder::new(&translated)
        .case_insensitive(true)
        .build()
        .map_err(|e| invalid("name", pattern, e.to_string()))
}

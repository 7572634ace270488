//! Date handling shared by the format processors.
//!
//! Third-party exports disagree on date encodings and are often sloppy about
//! them. Reading is therefore lenient: an absent date stays absent, and a date
//! that is present but unreadable resolves to the caller's fallback instead of
//! failing the record.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clipvault_core::defaults::NATIVE_DATE_FORMAT;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

/// Naive layouts tried after RFC 3339, all interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    NATIVE_DATE_FORMAT,
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Format a timestamp the way the native backup format writes it.
pub fn format_native(date: &DateTime<Utc>) -> String {
    date.format(NATIVE_DATE_FORMAT).to_string()
}

/// Parse a textual date in any of the layouts seen in supported exports.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|n| n.and_utc())
}

/// Resolve a JSON date field.
///
/// Strings are parsed with [`parse_date`]; numbers are epoch milliseconds.
/// Missing, null and blank values yield `None`; anything else that cannot be
/// read yields `Some(fallback)`.
pub fn lenient(raw: Option<&JsonValue>, fallback: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match raw? {
        JsonValue::Null => None,
        JsonValue::String(s) if s.trim().is_empty() => None,
        JsonValue::String(s) => Some(parse_date(s).unwrap_or(fallback)),
        JsonValue::Number(n) => Some(
            n.as_i64()
                .and_then(from_unix_millis)
                .unwrap_or(fallback),
        ),
        _ => Some(fallback),
    }
}

pub fn from_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Epoch milliseconds; zero means "no date" in the legacy formats.
pub fn from_unix_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

pub fn from_unix_micros(micros: i64) -> Option<DateTime<Utc>> {
    if micros == 0 {
        return None;
    }
    DateTime::from_timestamp_micros(micros)
}

// =============================================================================
// CLIP LOG HEADERS ("EEE MMM dd HH:mm:ss zzz yyyy")
// =============================================================================

static CLIP_LOG_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) (\d{1,2}) (\d{2}):(\d{2}):(\d{2}) (\S+) (\d{4})$",
    )
    .expect("clip log header pattern is valid")
});

static GMT_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:GMT|UTC)([+-])(\d{1,2}):?(\d{2})?$").expect("gmt offset pattern is valid")
});

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Offset in minutes for zone abbreviations seen in clip log exports.
fn zone_offset_minutes(zone: &str) -> Option<i32> {
    let minutes = match zone {
        // WAT is written by some devices but the exporting app treated it as GMT.
        "GMT" | "UTC" | "UT" | "Z" | "WAT" | "WET" => 0,
        "BST" | "CET" | "WEST" => 60,
        "CEST" | "EET" | "SAST" => 120,
        "EEST" | "MSK" => 180,
        "IST" => 330,
        "CST" => -360,
        "CDT" => -300,
        "EST" => -300,
        "EDT" => -240,
        "MST" => -420,
        "MDT" => -360,
        "PST" => -480,
        "PDT" => -420,
        "AKST" => -540,
        "AKDT" => -480,
        "HST" => -600,
        "JST" | "KST" => 540,
        "AWST" => 480,
        "AEST" => 600,
        "AEDT" => 660,
        "NZST" => 720,
        "NZDT" => 780,
        _ => {
            let caps = GMT_OFFSET.captures(zone)?;
            let hours: i32 = caps[2].parse().ok()?;
            let mins: i32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
            let total = hours * 60 + mins;
            if &caps[1] == "-" {
                -total
            } else {
                total
            }
        }
    };
    Some(minutes)
}

/// Parse a clip log header line such as `Tue Mar 05 14:02:11 GMT+01:00 2024`.
pub fn parse_clip_log_header(line: &str) -> Option<DateTime<Utc>> {
    let caps = CLIP_LOG_HEADER.captures(line.trim())?;
    let month = MONTHS.iter().position(|m| *m == &caps[1])? as u32 + 1;
    let day: u32 = caps[2].parse().ok()?;
    let hour: u32 = caps[3].parse().ok()?;
    let minute: u32 = caps[4].parse().ok()?;
    let second: u32 = caps[5].parse().ok()?;
    let year: i32 = caps[7].parse().ok()?;
    let offset = FixedOffset::east_opt(zone_offset_minutes(&caps[6])? * 60)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

//! Resolution of feed date/time fields to absolute timestamps.
//
// Feed producers emit start/end values either as floating local times
// (no zone), UTC-suffixed values, or values qualified by a TZID parameter.
// A duration may stand in for the end value. Whatever the input looks like,
// resolution always yields a (start, end) pair and never fails.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

/// A raw date/time field as it appears in the feed: the property value plus
/// its optional TZID parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTime {
    pub value: String,
    pub tzid: Option<String>,
}

impl RawTime {
    pub fn new(value: &str) -> Self {
        RawTime { value: value.to_string(), tzid: None }
    }

    pub fn with_tzid(value: &str, tzid: &str) -> Self {
        RawTime { value: value.to_string(), tzid: Some(tzid.to_string()) }
    }
}

/// Which path produced the resolved pair. `FallbackText` marks a recovered
/// timezone failure so callers and tests can see that the fallback was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Zoned,
    Floating,
    FallbackText,
}

/// An absolute (start, end) pair with `end >= start`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTimes {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resolution: Resolution,
}

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)([+-])?P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .unwrap()
});

/// Resolve a start/end field pair to absolute timestamps.
///
/// With no zone identifier on the start field the values are read as floating
/// local wall-clock times; a missing end falls back to `duration`, then to the
/// start itself (instantaneous event). A zone-qualified start resolves both
/// ends through the zone. An unrecognized zone never aborts: the raw textual
/// values are re-parsed best-effort instead.
pub fn resolve(start: &RawTime, end: Option<&RawTime>, duration: Option<&str>) -> ResolvedTimes {
    let (start_utc, resolution) = resolve_one(start);

    let end_utc = match end {
        Some(raw) => {
            // An end field without its own TZID inherits the start's zone.
            let inherited;
            let raw = if raw.tzid.is_none() && start.tzid.is_some() {
                inherited = RawTime { value: raw.value.clone(), tzid: start.tzid.clone() };
                &inherited
            } else {
                raw
            };
            resolve_one(raw).0
        }
        None => match duration.and_then(parse_duration) {
            Some(span) => start_utc + span,
            None => start_utc,
        },
    };

    // A producer emitting end < start gets an instantaneous event instead.
    let end_utc = if end_utc < start_utc { start_utc } else { end_utc };

    ResolvedTimes { start: start_utc, end: end_utc, resolution }
}

fn resolve_one(raw: &RawTime) -> (DateTime<Utc>, Resolution) {
    // A trailing Z is a zone identifier in its own right (UTC).
    if let Some(stripped) = raw.value.strip_suffix('Z') {
        if let Some(naive) = parse_naive(stripped) {
            return (Utc.from_utc_datetime(&naive), Resolution::Zoned);
        }
    }

    match &raw.tzid {
        None => match parse_naive(&raw.value) {
            Some(naive) => (floating_to_utc(&naive), Resolution::Floating),
            None => (fallback_text(&raw.value), Resolution::FallbackText),
        },
        Some(tzid) => match Tz::from_str(tzid) {
            Ok(tz) => match parse_naive(&raw.value) {
                Some(naive) => {
                    let zoned = tz
                        .from_local_datetime(&naive)
                        .earliest()
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|| Utc.from_utc_datetime(&naive));
                    (zoned, Resolution::Zoned)
                }
                None => (fallback_text(&raw.value), Resolution::FallbackText),
            },
            Err(_) => {
                warn!("Unrecognized timezone identifier '{}', falling back to textual parse", tzid);
                (fallback_text(&raw.value), Resolution::FallbackText)
            }
        },
    }
}

/// Best-effort parse of a raw date/time string once zone resolution has
/// failed. The reading is taken as UTC so that the result is still an
/// absolute timestamp.
fn fallback_text(value: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.with_timezone(&Utc);
    }
    let trimmed = value.strip_suffix('Z').unwrap_or(value);
    if let Some(naive) = parse_naive(trimmed) {
        return Utc.from_utc_datetime(&naive);
    }
    warn!("Unparseable date/time value '{}', substituting current time", value);
    Utc::now()
}

/// Parse the iCalendar basic formats: `YYYYMMDDTHHMMSS` or date-only
/// `YYYYMMDD` (midnight).
fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

/// Interpret a floating wall-clock reading in the system local zone. A DST
/// gap or fold maps through UTC instead so the result stays deterministic.
fn floating_to_utc(naive: &NaiveDateTime) -> DateTime<Utc> {
    match Local.from_local_datetime(naive).single() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(naive),
    }
}

/// Decode an iCalendar DURATION value (`P1DT2H30M`, `PT15M`, `P2W`, ...).
/// Returns None for anything undecodable.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let caps = DURATION_RE.captures(value.trim())?;
    let num = |i: usize| caps.get(i).map_or(0i64, |m| m.as_str().parse().unwrap_or(0));
    let mut total = Duration::weeks(num(2))
        + Duration::days(num(3))
        + Duration::hours(num(4))
        + Duration::minutes(num(5))
        + Duration::seconds(num(6));
    if total.is_zero() && !value.to_ascii_uppercase().contains(['W', 'D', 'H', 'M', 'S']) {
        debug!("Ignoring empty duration value '{}'", value);
        return None;
    }
    if caps.get(1).map(|m| m.as_str()) == Some("-") {
        total = -total;
    }
    Some(total)
}

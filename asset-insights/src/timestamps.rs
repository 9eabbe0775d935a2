//! Timestamp normalization
//!
//! The remote service encodes instants three ways: an OData epoch envelope
//! (`/Date(1609459200000)/`), plain ISO-8601-ish strings, and occasionally
//! numeric epoch counts. Everything is normalized to a UTC `DateTime` on the
//! way in and rendered back to the wire formats on the way out.

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};
use chrono_tz::Tz;

use crate::error::{FormatError, UnsupportedTimestamp};
use crate::warnings::{self, Warning};

/// Unit of a numeric epoch count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochUnit {
    Seconds,
    Milliseconds,
    Microseconds,
}

impl EpochUnit {
    fn micros_per_unit(self) -> f64 {
        match self {
            EpochUnit::Seconds => 1_000_000.0,
            EpochUnit::Milliseconds => 1_000.0,
            EpochUnit::Microseconds => 1.0,
        }
    }
}

/// Parse the service's OData timestamp envelope into a UTC instant
///
/// The wire format wraps a numeric epoch count in a fixed 6-character prefix
/// and 2-character suffix (`/Date(<count>)/`). Exactly those characters are
/// stripped; the remainder must parse as a number in `unit`.
pub fn parse_odata_timestamp(raw: &str, unit: EpochUnit) -> Result<DateTime<Utc>, FormatError> {
    let char_count = raw.chars().count();
    if char_count < 8 {
        return Err(FormatError::EnvelopeTooShort { len: char_count });
    }
    let payload: String = raw.chars().skip(6).take(char_count - 8).collect();
    let count: f64 = payload
        .trim()
        .parse()
        .map_err(|_| FormatError::NonNumericPayload {
            payload: payload.clone(),
        })?;
    epoch_to_instant(count, unit).ok_or(FormatError::NonNumericPayload { payload })
}

/// Parse an ISO-8601-ish string (or numeric epoch count, when `unit` is given)
/// into a UTC instant
///
/// Strings without an offset are interpreted as UTC directly; this is the
/// wire-reading path, where the service contract fixes the zone.
pub fn parse_string_timestamp(
    raw: &str,
    unit: Option<EpochUnit>,
) -> Result<DateTime<Utc>, UnsupportedTimestamp> {
    if let Some(unit) = unit {
        if let Ok(count) = raw.trim().parse::<f64>() {
            return epoch_to_instant(count, unit).ok_or_else(|| UnsupportedTimestamp {
                input: raw.to_string(),
            });
        }
    }
    match parse_flexible(raw) {
        Some(Parsed::Zoned(t)) => Ok(t.with_timezone(&Utc)),
        Some(Parsed::Naive(naive)) => Ok(Utc.from_utc_datetime(&naive)),
        None => Err(UnsupportedTimestamp {
            input: raw.to_string(),
        }),
    }
}

/// A timestamp-ish input accepted by [`coerce_any_to_instant`]
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampLike {
    /// ISO-8601-ish string, with or without an offset
    Text(String),
    /// Calendar date (midnight, timezone-naive)
    Date(NaiveDate),
    /// Timezone-naive datetime
    Naive(NaiveDateTime),
    /// Already-normalized UTC instant
    Instant(DateTime<Utc>),
    /// Datetime with an explicit offset
    Zoned(DateTime<FixedOffset>),
}

impl From<&str> for TimestampLike {
    fn from(s: &str) -> Self {
        TimestampLike::Text(s.to_string())
    }
}

impl From<String> for TimestampLike {
    fn from(s: String) -> Self {
        TimestampLike::Text(s)
    }
}

impl From<NaiveDate> for TimestampLike {
    fn from(d: NaiveDate) -> Self {
        TimestampLike::Date(d)
    }
}

impl From<NaiveDateTime> for TimestampLike {
    fn from(t: NaiveDateTime) -> Self {
        TimestampLike::Naive(t)
    }
}

impl From<DateTime<Utc>> for TimestampLike {
    fn from(t: DateTime<Utc>) -> Self {
        TimestampLike::Instant(t)
    }
}

impl From<DateTime<FixedOffset>> for TimestampLike {
    fn from(t: DateTime<FixedOffset>) -> Self {
        TimestampLike::Zoned(t)
    }
}

/// Coerce a heterogeneous timestamp input to a UTC instant
///
/// Returns `default` when `value` is `None`. Timezone-aware inputs are
/// converted to UTC; timezone-naive inputs emit a warning and are assumed to
/// be UTC. Unparseable strings fail with [`UnsupportedTimestamp`].
pub fn coerce_any_to_instant(
    value: Option<TimestampLike>,
    default: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, UnsupportedTimestamp> {
    coerce_any_to_instant_in(value, default, Tz::UTC)
}

/// Like [`coerce_any_to_instant`], but naive inputs are interpreted in
/// `assumed_zone` instead of UTC
///
/// Local times that are ambiguous or nonexistent under a DST transition in
/// `assumed_zone` resolve to `Ok(None)`, never a failure.
pub fn coerce_any_to_instant_in(
    value: Option<TimestampLike>,
    default: Option<DateTime<Utc>>,
    assumed_zone: Tz,
) -> Result<Option<DateTime<Utc>>, UnsupportedTimestamp> {
    let value = match value {
        Some(value) => value,
        None => return Ok(default),
    };
    let instant = match value {
        TimestampLike::Instant(t) => Some(t),
        TimestampLike::Zoned(t) => Some(t.with_timezone(&Utc)),
        TimestampLike::Naive(naive) => localize_naive(naive, assumed_zone),
        TimestampLike::Date(date) => {
            localize_naive(NaiveDateTime::new(date, NaiveTime::MIN), assumed_zone)
        }
        TimestampLike::Text(raw) => match parse_flexible(&raw) {
            Some(Parsed::Zoned(t)) => Some(t.with_timezone(&Utc)),
            Some(Parsed::Naive(naive)) => localize_naive(naive, assumed_zone),
            None => return Err(UnsupportedTimestamp { input: raw }),
        },
    };
    Ok(instant)
}

/// Render a UTC instant as an ISO string without offset, optionally `Z`-suffixed
pub fn instant_to_iso<Z: TimeZone>(instant: &DateTime<Z>, with_zulu: bool) -> String {
    let utc = instant.with_timezone(&Utc);
    let mut rendered = utc.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = utc.timestamp_subsec_micros();
    if micros != 0 {
        rendered.push_str(&format!(".{:06}", micros));
    }
    if with_zulu {
        rendered.push('Z');
    }
    rendered
}

/// Render a UTC instant as `YYYY-MM-DD`, warning when the cast is lossy
pub fn instant_to_date_string<Z: TimeZone>(instant: &DateTime<Z>) -> String {
    let naive = instant.with_timezone(&Utc).naive_utc();
    if naive.time() != NaiveTime::MIN {
        warnings::emit(Warning::LossyDateCast);
    }
    naive.date().format("%Y-%m-%d").to_string()
}

/// Largest "round" duration that divides `total_interval` into at least
/// `min_breaks` pieces
///
/// The catalog covers seconds through 30 days; very short intervals clamp to
/// the smallest entry.
pub fn nice_sub_interval(total_interval: Duration, min_breaks: u32) -> Duration {
    let catalog: Vec<Duration> = [
        1, 5, 15, 60, 300, 900, 3_600, 14_400, 43_200, 86_400, 259_200, 604_800, 2_592_000,
    ]
    .iter()
    .map(|&s| Duration::seconds(s))
    .collect();

    let breaks = min_breaks.max(1) as i32;
    let mut target = total_interval / breaks;
    if target < catalog[0] {
        target = catalog[0];
    }
    catalog
        .iter()
        .rev()
        .find(|&&candidate| candidate <= target)
        .copied()
        .unwrap_or(catalog[0])
}

enum Parsed {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

fn parse_flexible(raw: &str) -> Option<Parsed> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(Parsed::Zoned(t));
    }
    if let Ok(t) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(Parsed::Zoned(t));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Parsed::Naive(naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Parsed::Naive(NaiveDateTime::new(date, NaiveTime::MIN)));
    }
    None
}

fn localize_naive(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    warnings::emit(Warning::NaiveTimestampAssumed {
        zone: zone.name().to_string(),
    });
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        // ambiguous or nonexistent under DST: explicit unknown, not a crash
        LocalResult::Ambiguous(_, _) | LocalResult::None => None,
    }
}

fn epoch_to_instant(count: f64, unit: EpochUnit) -> Option<DateTime<Utc>> {
    let micros = count * unit.micros_per_unit();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::capture;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_odata_timestamp_millis() {
        let actual = parse_odata_timestamp("/Date(1609459200000)/", EpochUnit::Milliseconds);
        assert_eq!(actual, Ok(utc(2021, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_parse_odata_timestamp_fractional_millis() {
        let actual =
            parse_odata_timestamp("/Date(1609459200123.5)/", EpochUnit::Milliseconds).unwrap();
        assert_eq!(actual.timestamp_subsec_micros(), 123_500);
    }

    #[test]
    fn test_parse_odata_timestamp_short_envelope() {
        assert_eq!(
            parse_odata_timestamp("/Date)/", EpochUnit::Milliseconds),
            Err(FormatError::EnvelopeTooShort { len: 7 })
        );
    }

    #[test]
    fn test_parse_odata_timestamp_non_numeric() {
        let actual = parse_odata_timestamp("/Date(tomorrow)/", EpochUnit::Milliseconds);
        assert_eq!(
            actual,
            Err(FormatError::NonNumericPayload {
                payload: "tomorrow".into()
            })
        );
    }

    #[test]
    fn test_parse_string_timestamp_iso() {
        let actual = parse_string_timestamp("2021-01-01T18:00:00+02:00", None).unwrap();
        assert_eq!(actual, utc(2021, 1, 1, 16, 0, 0));
    }

    #[test]
    fn test_parse_string_timestamp_naive_is_utc_without_warning() {
        let ((), warnings) = capture(|| {
            let actual = parse_string_timestamp("2021-01-01 16:00:00", None).unwrap();
            assert_eq!(actual, utc(2021, 1, 1, 16, 0, 0));
        });
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_string_timestamp_numeric_with_unit() {
        let actual = parse_string_timestamp("1609459200", Some(EpochUnit::Seconds)).unwrap();
        assert_eq!(actual, utc(2021, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_parse_string_timestamp_rejects_garbage() {
        assert!(parse_string_timestamp("not a time", None).is_err());
    }

    #[test]
    fn test_coerce_iso_string_with_offset() {
        let actual =
            coerce_any_to_instant(Some("2021-01-01 18:00:00+02:00".into()), None).unwrap();
        assert_eq!(actual, Some(utc(2021, 1, 1, 16, 0, 0)));
    }

    #[test]
    fn test_coerce_naive_datetime_assumes_utc_with_warning() {
        let naive = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        let (actual, warnings) =
            capture(|| coerce_any_to_instant(Some(naive.into()), None).unwrap());
        assert_eq!(actual, Some(utc(2021, 1, 1, 16, 0, 0)));
        assert_eq!(
            warnings,
            vec![Warning::NaiveTimestampAssumed { zone: "UTC".into() }]
        );
    }

    #[test]
    fn test_coerce_naive_date() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let (actual, warnings) =
            capture(|| coerce_any_to_instant(Some(date.into()), None).unwrap());
        assert_eq!(actual, Some(utc(2021, 1, 1, 0, 0, 0)));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_coerce_instant_is_idempotent() {
        let instant = utc(2021, 1, 1, 16, 0, 0);
        let ((), warnings) = capture(|| {
            let once = coerce_any_to_instant(Some(instant.into()), None)
                .unwrap()
                .unwrap();
            let twice = coerce_any_to_instant(Some(once.into()), None)
                .unwrap()
                .unwrap();
            assert_eq!(twice, instant);
        });
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_coerce_none_returns_default() {
        let fallback = utc(2020, 6, 1, 0, 0, 0);
        assert_eq!(
            coerce_any_to_instant(None, Some(fallback)).unwrap(),
            Some(fallback)
        );
        assert_eq!(coerce_any_to_instant(None, None).unwrap(), None);
    }

    #[test]
    fn test_coerce_ambiguous_dst_time_is_none() {
        // 02:30 on 2021-10-31 happens twice in Berlin
        let naive = NaiveDate::from_ymd_opt(2021, 10, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let (actual, warnings) = capture(|| {
            coerce_any_to_instant_in(Some(naive.into()), None, chrono_tz::Europe::Berlin).unwrap()
        });
        assert_eq!(actual, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_coerce_nonexistent_dst_time_is_none() {
        // 02:30 on 2021-03-28 is skipped in Berlin
        let naive = NaiveDate::from_ymd_opt(2021, 3, 28)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let (actual, _) = capture(|| {
            coerce_any_to_instant_in(Some(naive.into()), None, chrono_tz::Europe::Berlin).unwrap()
        });
        assert_eq!(actual, None);
    }

    #[test]
    fn test_instant_to_iso() {
        let instant = utc(2021, 1, 1, 16, 0, 0);
        assert_eq!(instant_to_iso(&instant, false), "2021-01-01T16:00:00");
        assert_eq!(instant_to_iso(&instant, true), "2021-01-01T16:00:00Z");
    }

    #[test]
    fn test_instant_to_iso_keeps_microseconds() {
        let instant = utc(2021, 1, 1, 16, 0, 0) + Duration::microseconds(123_456);
        assert_eq!(instant_to_iso(&instant, false), "2021-01-01T16:00:00.123456");
    }

    #[test]
    fn test_instant_to_iso_converts_to_utc() {
        let zoned = DateTime::parse_from_rfc3339("2021-01-01T18:00:00+02:00").unwrap();
        assert_eq!(instant_to_iso(&zoned, false), "2021-01-01T16:00:00");
    }

    #[test]
    fn test_date_string_warns_on_time_of_day() {
        let instant = utc(2021, 1, 1, 2, 0, 0);
        let (actual, warnings) = capture(|| instant_to_date_string(&instant));
        assert_eq!(actual, "2021-01-01");
        assert_eq!(warnings, vec![Warning::LossyDateCast]);
    }

    #[test]
    fn test_date_string_handles_timezone() {
        let zoned = DateTime::parse_from_rfc3339("2021-01-01T02:00:00+04:00").unwrap();
        let (actual, warnings) = capture(|| instant_to_date_string(&zoned));
        assert_eq!(actual, "2020-12-31");
        assert_eq!(warnings, vec![Warning::LossyDateCast]);
    }

    #[test]
    fn test_date_string_midnight_no_warning() {
        let instant = utc(2021, 1, 1, 0, 0, 0);
        let (actual, warnings) = capture(|| instant_to_date_string(&instant));
        assert_eq!(actual, "2021-01-01");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_date_string_round_trips_through_coerce() {
        let midnight = utc(2021, 1, 1, 0, 0, 0);
        let ((), warnings) = capture(|| {
            let rendered = instant_to_date_string(&midnight);
            let parsed = coerce_any_to_instant(Some(rendered.as_str().into()), None)
                .unwrap()
                .unwrap();
            assert_eq!(parsed, midnight);
        });
        // only the naive-input warning from re-parsing the bare date
        assert_eq!(
            warnings,
            vec![Warning::NaiveTimestampAssumed { zone: "UTC".into() }]
        );
    }

    #[test]
    fn test_nice_sub_interval_divides_a_day() {
        let actual = nice_sub_interval(Duration::days(1), 10);
        // 24h / 10 = 2.4h; largest catalog entry not above that is 1h
        assert_eq!(actual, Duration::hours(1));
    }

    #[test]
    fn test_nice_sub_interval_short_interval_clamps() {
        let actual = nice_sub_interval(Duration::milliseconds(500), 10);
        assert_eq!(actual, Duration::seconds(1));
    }

    #[test]
    fn test_nice_sub_interval_single_break() {
        let actual = nice_sub_interval(Duration::days(1), 1);
        assert_eq!(actual, Duration::days(1));
    }

    #[test]
    fn test_nice_sub_interval_long_range_caps_at_catalog() {
        let actual = nice_sub_interval(Duration::days(365), 2);
        assert_eq!(actual, Duration::days(30));
    }
}

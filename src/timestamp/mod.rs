//! Meter clock timestamp resolution.
//!
//! The meter prints `YYMMDDhhmmss` followed by an optional DST letter:
//! `S` for summer time, `W` for winter time, case-insensitive. When the
//! letter is present the stamp resolves against the fixed seasonal
//! offset (UTC+2 respectively UTC+1), which sidesteps the ambiguity at
//! the transition instants. Without the letter the stamp resolves with
//! the meter's home civil rules (CET/CEST under the EU transition rule).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Weekday};

/// CET, the standard offset of the meter's home zone.
const WINTER_OFFSET_SECS: i32 = 3600;
/// CEST.
const SUMMER_OFFSET_SECS: i32 = 2 * 3600;

/// Parses a compact meter timestamp into a zone-aware instant.
///
/// Returns `None` for empty, short, or otherwise unparseable input;
/// absence of a clock value is a normal state for the caller, not an
/// error. Years are interpreted as 2000 + YY.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let year = 2000 + digits2(text, 0)? as i32;
    let month = digits2(text, 2)?;
    let day = digits2(text, 4)?;
    let hour = digits2(text, 6)?;
    let minute = digits2(text, 8)?;
    let second = digits2(text, 10)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    let offset_secs = match text.get(12..) {
        Some("S") | Some("s") => SUMMER_OFFSET_SECS,
        Some("W") | Some("w") => WINTER_OFFSET_SECS,
        _ => {
            if dst_active(&naive) {
                SUMMER_OFFSET_SECS
            } else {
                WINTER_OFFSET_SECS
            }
        }
    };

    let offset = FixedOffset::east_opt(offset_secs)?;
    offset.from_local_datetime(&naive).single()
}

fn digits2(text: &str, idx: usize) -> Option<u32> {
    let pair = text.get(idx..idx + 2)?;
    if !pair.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    pair.parse().ok()
}

/// EU transition rule for the home zone: DST runs from the last Sunday
/// of March 02:00 standard time until the last Sunday of October 03:00
/// summer time. The ambiguous fall-back hour resolves to the summer
/// offset.
fn dst_active(local: &NaiveDateTime) -> bool {
    let year = local.date().year();
    let bounds = last_sunday(year, 3)
        .and_then(|d| d.and_hms_opt(2, 0, 0))
        .zip(last_sunday(year, 10).and_then(|d| d.and_hms_opt(3, 0, 0)));
    match bounds {
        Some((start, end)) => *local >= start && *local < end,
        None => false,
    }
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    let mut day = first_of_next.pred_opt()?;
    while day.weekday() != Weekday::Sun {
        day = day.pred_opt()?;
    }
    Some(day)
}

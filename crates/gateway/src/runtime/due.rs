//! Due calculator. Turns an entry's local date/time/timezone into a UTC
//! instant and decides whether it has arrived.
//!
//! **DST handling:**
//! - Fall-back overlaps: the earliest (pre-transition) mapping is chosen.
//! - Spring-forward gaps: the local time is read with the offset in effect
//!   before the transition, so it lands just after the gap closes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

use super::entries::Entry;

/// A stored entry whose schedule fields cannot be turned into an instant.
/// Distinct from "not due": the caller logs it and leaves the entry alone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DueError {
    #[error("invalid date/time '{date}T{time}'")]
    InvalidDateTime { date: String, time: String },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("local time {0} cannot be represented in UTC")]
    OutOfRange(NaiveDateTime),
}

/// Parse a literal `YYYY-MM-DD` date: four-digit year, two-digit month and
/// day. `%Y` alone would also take signed and five-digit years.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    let date = date.trim();
    let b = date.as_bytes();
    let shaped = b.len() == 10
        && b.iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            _ => c.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Parse `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`.
pub fn parse_time(time: &str) -> Option<NaiveTime> {
    let time = time.trim();
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(time, fmt).ok())
}

/// Parse an IANA timezone name.
pub fn parse_timezone(tz: &str) -> Option<chrono_tz::Tz> {
    tz.trim().parse::<chrono_tz::Tz>().ok()
}

/// Combine a local date and time into a zone-naive timestamp.
pub fn parse_local(date: &str, time: &str) -> Result<NaiveDateTime, DueError> {
    match (parse_date(date), parse_time(time)) {
        (Some(d), Some(t)) => Ok(d.and_time(t)),
        _ => Err(DueError::InvalidDateTime {
            date: date.to_string(),
            time: time.to_string(),
        }),
    }
}

/// Attach `tz` to a local timestamp and convert to UTC. Timestamps at the
/// edge of the representable range yield [`DueError::OutOfRange`].
pub fn local_to_utc(local: NaiveDateTime, tz: chrono_tz::Tz) -> Result<DateTime<Utc>, DueError> {
    match tz.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        chrono::LocalResult::None => {
            // Gap: no transition happens within a day of another, so the
            // offset a day earlier is the one in effect before the gap.
            let before = local
                .checked_sub_signed(chrono::Duration::days(1))
                .ok_or(DueError::OutOfRange(local))?;
            let offset = match tz.offset_from_local_datetime(&before) {
                chrono::LocalResult::Single(o) | chrono::LocalResult::Ambiguous(o, _) => {
                    o.fix().local_minus_utc()
                }
                chrono::LocalResult::None => 0,
            };
            let utc = local
                .checked_sub_signed(chrono::Duration::seconds(offset as i64))
                .ok_or(DueError::OutOfRange(local))?;
            Ok(Utc.from_utc_datetime(&utc))
        }
    }
}

/// The absolute instant at which `entry` fires.
pub fn due_instant(entry: &Entry) -> Result<DateTime<Utc>, DueError> {
    let local = parse_local(&entry.fire_date, &entry.fire_time)?;
    let tz = parse_timezone(&entry.fire_timezone)
        .ok_or_else(|| DueError::UnknownTimezone(entry.fire_timezone.clone()))?;
    local_to_utc(local, tz)
}

/// `Ok(true)` iff the entry's fire instant is at or before `now`. Stale
/// entries never expire: anything in the past is due.
pub fn is_due(entry: &Entry, now: DateTime<Utc>) -> Result<bool, DueError> {
    Ok(due_instant(entry)? <= now)
}

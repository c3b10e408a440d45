//! Conversions between UTC timestamps and the admin's local timezone.

use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use time_tz::{Offset, OffsetDateTimeExt, OffsetResult, PrimitiveDateTimeExt, TimeZone, Tz};

use crate::Error;

/// Get the UTC offset of `canonical_timezone`, e.g. "Pacific/Auckland", at the current time.
///
/// Returns `None` if `canonical_timezone` is not a known timezone name.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    get_offset_at(canonical_timezone, OffsetDateTime::now_utc())
}

fn get_offset_at(canonical_timezone: &str, instant: OffsetDateTime) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&instant).to_utc())
}

/// The start (inclusive) and end (exclusive) of the local calendar day that contains `now`.
///
/// Each bound is local midnight with the offset in effect at that instant, so a day that
/// crosses a daylight saving transition is 23 or 25 hours long.
///
/// # Errors
/// Returns [Error::InvalidTimezone] if `canonical_timezone` is not a known timezone name.
pub fn local_day_bounds(
    canonical_timezone: &str,
    now: OffsetDateTime,
) -> Result<(OffsetDateTime, OffsetDateTime), Error> {
    let tz = time_tz::timezones::get_by_name(canonical_timezone)
        .ok_or_else(|| Error::InvalidTimezone(canonical_timezone.to_owned()))?;

    let today = now.to_timezone(tz).date();
    let tomorrow = today.saturating_add(Duration::days(1));

    Ok((local_midnight(tz, today), local_midnight(tz, tomorrow)))
}

/// The first instant of `date` in `tz`.
fn local_midnight(tz: &Tz, date: Date) -> OffsetDateTime {
    let midnight = PrimitiveDateTime::new(date, Time::MIDNIGHT);

    match midnight.assume_timezone(tz) {
        OffsetResult::Some(start) => start,
        // Clocks went back over midnight, the day starts at the earlier of the two.
        OffsetResult::Ambiguous(earlier, _) => earlier,
        // Clocks skipped midnight, the day starts at the transition. Reading midnight with
        // the offset from before the gap gives that instant.
        OffsetResult::None => {
            let offset_before = tz
                .get_offset_utc(&(midnight - Duration::days(1)).assume_utc())
                .to_utc();
            midnight.assume_offset(offset_before).to_timezone(tz)
        }
    }
}

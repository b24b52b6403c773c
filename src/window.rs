//! Broadcast-day window in a fixed reference timezone
//!
//! TV guides schedule in broadcast days that run 06:00 to 06:00 the next
//! morning rather than midnight to midnight. The window is anchored at 06:00
//! civil time in the configured timezone on that timezone's current calendar
//! date, then expressed as absolute UTC instants.

use chrono::{DateTime, Duration, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Civil hour at which a broadcast day starts.
pub const BROADCAST_DAY_START_HOUR: u32 = 6;

/// Half-open 24-hour interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadcastWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Signed UTC offset of `tz` at `at`, in fractional hours.
///
/// DST transitions are handled by the IANA database behind `chrono-tz`. The
/// result is folded into `(-12, 12]` so offset arithmetic on the civil date
/// never wraps: +13 becomes -11, -12 becomes +12.
pub fn offset_hours(tz: Tz, at: DateTime<Utc>) -> f64 {
    let secs = tz
        .offset_from_utc_datetime(&at.naive_utc())
        .fix()
        .local_minus_utc() as i64;

    let mut minutes = secs / 60;
    if minutes > 720 {
        minutes -= 1440;
    } else if minutes <= -720 {
        minutes += 1440;
    }
    minutes as f64 / 60.0
}

/// Today's broadcast window for the reference timezone, computed from `now`.
///
/// "Today" is the reference timezone's own calendar date. Deriving it from the
/// UTC date instead would misplace the whole window by one civil day whenever
/// the two dates differ, e.g. shortly before UTC midnight in a UTC+1 zone.
pub fn broadcast_window(now: DateTime<Utc>, tz: Tz) -> BroadcastWindow {
    let offset_secs = (offset_hours(tz, now) * 3600.0).round() as i64;
    let local_date = (now + Duration::seconds(offset_secs)).date_naive();

    let start_civil = local_date
        .and_hms_opt(BROADCAST_DAY_START_HOUR, 0, 0)
        .unwrap_or_default();
    let start = Utc.from_utc_datetime(&start_civil) - Duration::seconds(offset_secs);

    BroadcastWindow {
        start,
        end: start + Duration::hours(24),
    }
}

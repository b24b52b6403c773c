//! XMLTV timestamp handling
//!
//! Wire format: `YYYYMMDDhhmmss +hhmm` — a 14-digit civil clock reading,
//! optionally followed by a UTC offset. Some mirrors omit the offset entirely;
//! those timestamps are taken as UTC. The civil part is the local clock at the
//! stated offset, so removing the offset yields the true UTC instant.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

/// Parse an XMLTV timestamp into a UTC instant.
///
/// Returns `None` for anything malformed: short or non-numeric civil part,
/// invalid calendar values, or an offset of 24 hours or more. Records carrying
/// such timestamps are dropped downstream, never a hard error.
pub fn parse_xmltv(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if !raw.is_ascii() {
        return None;
    }

    let (civil, offset_secs) = match raw.find(' ') {
        Some(pos) => (&raw[..pos], parse_offset(&raw[pos + 1..])?),
        None if raw.len() > 14 => (&raw[..14], parse_offset(&raw[14..])?),
        None => (raw, 0),
    };

    if civil.len() != 14 || !civil.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let civil = NaiveDateTime::parse_from_str(civil, "%Y%m%d%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&civil) - Duration::seconds(offset_secs))
}

/// Format a UTC instant as an XMLTV timestamp at the given offset.
pub fn format_xmltv(instant: DateTime<Utc>, offset_minutes: i32) -> String {
    let local = instant + Duration::minutes(offset_minutes as i64);
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.unsigned_abs();
    format!(
        "{} {}{:02}{:02}",
        local.format("%Y%m%d%H%M%S"),
        sign,
        abs / 60,
        abs % 60
    )
}

/// Parse an offset like "+0100" or "-0530" to signed seconds.
fn parse_offset(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let sign = match raw.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = &raw[1..];
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i64 = digits[0..2].parse().ok()?;
    let minutes: i64 = digits[2..4].parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }

    Some(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let t = parse_xmltv("20240115120000 +0000").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn positive_offset_shifts_backwards() {
        let plus_one = parse_xmltv("20240115120000 +0100").unwrap();
        let utc = parse_xmltv("20240115120000 +0000").unwrap();
        assert_eq!(utc - plus_one, Duration::hours(1));
    }

    #[test]
    fn negative_offset_shifts_forwards() {
        let minus_0530 = parse_xmltv("20240115120000 -0530").unwrap();
        let utc = parse_xmltv("20240115120000 +0000").unwrap();
        assert_eq!(minus_0530 - utc, Duration::minutes(330));
    }

    #[test]
    fn missing_offset_defaults_to_utc() {
        let bare = parse_xmltv("20240115120000").unwrap();
        assert_eq!(bare, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn offset_without_space_is_accepted() {
        let t = parse_xmltv("20240115120000+0200").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
    }

    #[test]
    fn round_trip_across_offsets() {
        let t = Utc.with_ymd_and_hms(2025, 6, 15, 10, 30, 0).unwrap();
        for offset_minutes in [0, 60, 120, -330, 765, -720] {
            let formatted = format_xmltv(t, offset_minutes);
            assert_eq!(parse_xmltv(&formatted), Some(t), "offset {}", offset_minutes);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_xmltv(""), None);
        assert_eq!(parse_xmltv("not a timestamp"), None);
        assert_eq!(parse_xmltv("2024011512"), None);
        assert_eq!(parse_xmltv("20241315120000 +0000"), None); // month 13
        assert_eq!(parse_xmltv("20240115120000 +2400"), None);
        assert_eq!(parse_xmltv("20240115120000 +01"), None);
        assert_eq!(parse_xmltv("20240115120000 0100"), None);
        assert_eq!(parse_xmltv("2024X115120000 +0000"), None);
    }
}

//! Time of day formatting and tick scheduling

use chrono::{NaiveDateTime, Timelike};

/// Minutes between two weather requests
pub const WEATHER_INTERVAL_MIN: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HourFormat {
    #[default]
    H24,
    H12,
}

/// Format `time` as `HH:MM` into `buf`.
pub fn format_time<'b>(
    time: &NaiveDateTime,
    format: HourFormat,
    buf: &'b mut [u8],
) -> Result<&'b str, core::fmt::Error> {
    let hour = match format {
        HourFormat::H24 => time.hour(),
        HourFormat::H12 => time.hour12().1,
    };
    format_no_std::show(buf, format_args!("{:02}:{:02}", hour, time.minute()))
}

/// Milliseconds from `time` until the next full minute
pub fn until_next_minute(time: &NaiveDateTime) -> u64 {
    // Leap seconds report more than 1e9 nanoseconds
    let elapsed = time.second() as u64 * 1_000 + (time.nanosecond() / 1_000_000).min(999) as u64;
    60_000u64.saturating_sub(elapsed).max(1)
}

/// Whether a weather refresh is due at this minute
pub fn weather_due(time: &NaiveDateTime) -> bool {
    time.minute() % WEATHER_INTERVAL_MIN == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, min: u32, sec: u32, milli: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_hms_milli_opt(hour, min, sec, milli)
            .unwrap()
    }

    #[test]
    fn formats_24h() {
        let mut buf = [0u8; 8];
        assert_eq!(format_time(&at(7, 5, 0, 0), HourFormat::H24, &mut buf), Ok("07:05"));
        assert_eq!(format_time(&at(23, 59, 0, 0), HourFormat::H24, &mut buf), Ok("23:59"));
        assert_eq!(format_time(&at(0, 0, 0, 0), HourFormat::H24, &mut buf), Ok("00:00"));
    }

    #[test]
    fn formats_12h() {
        let mut buf = [0u8; 8];
        assert_eq!(format_time(&at(0, 15, 0, 0), HourFormat::H12, &mut buf), Ok("12:15"));
        assert_eq!(format_time(&at(13, 4, 0, 0), HourFormat::H12, &mut buf), Ok("01:04"));
    }

    #[test]
    fn small_buffer_fails() {
        let mut buf = [0u8; 3];
        assert!(format_time(&at(12, 0, 0, 0), HourFormat::H24, &mut buf).is_err());
    }

    #[test]
    fn next_minute() {
        assert_eq!(until_next_minute(&at(10, 0, 0, 0)), 60_000);
        assert_eq!(until_next_minute(&at(10, 0, 59, 500)), 500);
        assert_eq!(until_next_minute(&at(10, 0, 30, 0)), 30_000);
    }

    #[test]
    fn weather_on_half_hours() {
        assert!(weather_due(&at(9, 0, 0, 0)));
        assert!(weather_due(&at(9, 30, 0, 0)));
        assert!(!weather_due(&at(9, 1, 0, 0)));
        assert!(!weather_due(&at(9, 45, 0, 0)));
    }
}

//! Time keeping module for PineTime
//!
//! There is no battery backed RTC: wall time is a reference point plus the
//! uptime elapsed since it was taken.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use embassy_time::Instant;

/// Current Time Service payload length
pub const CTS_LEN: usize = 10;

pub struct TimeReference {
    /// Local clock time
    time: NaiveDateTime,
    /// Related system time
    instant: Instant,
}

impl TimeReference {
    /// Reference from seconds since the epoch, shifted into local time
    pub fn from_epoch(epoch: i64, utc_offset: i32) -> Option<Self> {
        let time = DateTime::from_timestamp(epoch + utc_offset as i64, 0)?.naive_utc();
        Some(Self {
            time,
            instant: Instant::now(),
        })
    }

    /// Reference from Current Time Service data
    ///
    /// Returns `None` for dates or times out of range.
    pub fn from_cts_bytes(bytes: &[u8; CTS_LEN]) -> Option<Self> {
        let year = u16::from_le_bytes([bytes[0], bytes[1]]) as i32;
        let month = bytes[2] as u32;
        let day = bytes[3] as u32;
        let hour = bytes[4] as u32;
        let min = bytes[5] as u32;
        let sec = bytes[6] as u32;
        // bytes[7] is the day of week, bytes[9] the adjust reason
        let milli = bytes[8] as u32 * 1000 / 256; // Convert fractions_256 to milliseconds

        let time = NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_milli_opt(hour, min, sec, milli)?;

        Some(Self {
            time,
            instant: Instant::now(),
        })
    }
}

pub struct TimeManager {
    reference: TimeReference,
}

impl TimeManager {
    pub fn new(reference: TimeReference) -> Self {
        Self { reference }
    }

    /// Get current local time
    pub fn now(&self) -> NaiveDateTime {
        let elapsed = Instant::now().duration_since(self.reference.instant);
        let elapsed = TimeDelta::microseconds(elapsed.as_micros() as i64);
        self.reference
            .time
            .checked_add_signed(elapsed)
            .unwrap_or(self.reference.time)
    }

    /// Update time reference
    pub fn set_time(&mut self, reference: TimeReference) {
        self.reference = reference;
    }
}

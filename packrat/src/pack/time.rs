//! Entry timestamp conversions.
//!
//! Timestamps travel through a civil date + time-of-day intermediate
//! ([`FileTime`]) so that round-tripping between filesystem metadata (local
//! zone) and archive-stored DOS times stays unambiguous.

use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// A civil timestamp attached to an archive entry.
pub type FileTime = NaiveDateTime;

/// Convert a filesystem modification time into the civil intermediate.
pub(crate) fn from_system_time(t: SystemTime) -> FileTime {
    DateTime::<Local>::from(t).naive_local()
}

/// Convert the civil intermediate back into a filesystem time.
///
/// Returns `None` for local times that do not exist (DST gaps).
pub(crate) fn to_system_time(t: FileTime) -> Option<SystemTime> {
    Local.from_local_datetime(&t).earliest().map(SystemTime::from)
}

/// Convert a zip DOS timestamp into the civil intermediate.
///
/// The zip codec already rejects years before the format's 1980 epoch
/// floor, so this only fails on out-of-range field combinations.
pub(crate) fn from_zip_datetime(dt: zip::DateTime) -> Option<FileTime> {
    NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))?
        .and_hms_opt(
            u32::from(dt.hour()),
            u32::from(dt.minute()),
            u32::from(dt.second()),
        )
}

/// Convert the civil intermediate into a zip DOS timestamp.
///
/// Returns `None` when the time cannot be represented (before 1980 or
/// after 2107).
pub(crate) fn to_zip_datetime(t: FileTime) -> Option<zip::DateTime> {
    let year = u16::try_from(t.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_datetime_round_trip() {
        let ft = NaiveDate::from_ymd_opt(1996, 1, 29)
            .unwrap()
            .and_hms_opt(13, 37, 42)
            .unwrap();
        let zdt = to_zip_datetime(ft).unwrap();
        let back = from_zip_datetime(zdt).unwrap();
        assert_eq!(back, ft);
    }

    #[test]
    fn zip_datetime_rejects_pre_epoch() {
        let ft = NaiveDate::from_ymd_opt(1979, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        assert!(to_zip_datetime(ft).is_none());
    }

    #[test]
    fn system_time_round_trip() {
        let ft = NaiveDate::from_ymd_opt(2004, 8, 3)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap();
        let st = to_system_time(ft).unwrap();
        assert_eq!(from_system_time(st), ft);
    }
}

use chrono::{DateTime, Local, NaiveDate, TimeZone};

use crate::error::{LedgerError, Result};

/// Source of "now" for the ledger. Day keys are derived from local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock pinned to one instant.
pub struct FixedClock(pub DateTime<Local>);

impl FixedClock {
    /// Noon local time on `date`.
    #[must_use]
    pub fn at_noon(date: NaiveDate) -> Self {
        let instant = date
            .and_hms_opt(12, 0, 0)
            .and_then(|noon| Local.from_local_datetime(&noon).earliest())
            .unwrap_or_else(Local::now);
        FixedClock(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Local calendar day of a millisecond timestamp.
pub fn local_date_of_millis(millis: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(&Local).date_naive())
        .ok_or_else(|| LedgerError::validation(format!("Timestamp {millis} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_today() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let clock = FixedClock::at_noon(date);
        assert_eq!(clock.today(), date);
    }

    #[test]
    fn test_local_date_of_millis_roundtrips_clock() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let clock = FixedClock::at_noon(date);
        assert_eq!(local_date_of_millis(clock.now_millis()).unwrap(), date);
    }

    #[test]
    fn test_local_date_of_millis_out_of_range() {
        assert!(local_date_of_millis(i64::MAX).is_err());
    }
}

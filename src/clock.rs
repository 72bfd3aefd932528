//! Time source used by the circulation engines

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Injectable "now"
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Calendar helpers on top of any [`Clock`]
pub trait ClockExt: Clock {
    /// Calendar date used for loan, due and return dates
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl<T: Clock + ?Sized> ClockExt for T {}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Clock set to midday UTC on the given date
    pub fn at_date(date: NaiveDate) -> Self {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc();
        Self::new(noon)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances_by_days() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let clock = FixedClock::at_date(start);
        clock.advance_days(3);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_today_derives_from_now() {
        let mut clock = MockClock::new();
        let instant = DateTime::parse_from_rfc3339("2024-05-10T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        clock.expect_now().return_const(instant);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    }
}

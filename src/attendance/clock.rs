use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::utils::time::{local_date, start_of_local_day};

/// Wall-clock source with a fixed reporting time zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    /// Calendar day of `timestamp` in the reporting time zone.
    fn day_of(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        local_date(timestamp, self.offset())
    }

    /// Instant at which the reporting day containing `timestamp` began.
    fn start_of_day(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        start_of_local_day(self.day_of(timestamp), self.offset())
    }

    fn today(&self) -> NaiveDate {
        self.day_of(self.now())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

use time::{Date, OffsetDateTime};

/// Source of "today" for the store's date-scoped views.
pub trait Clock: Send + Sync {
    fn today(&self) -> Date;
}

/// Wall clock in the local timezone, UTC when the offset can't be determined.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .date()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}

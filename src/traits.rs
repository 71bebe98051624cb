//! Abstractions for time access to enable testing.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Trait for abstracting time access.
///
/// The web form defaults its date and time inputs to "now"; injecting a
/// clock keeps those pages deterministic under test.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current time in the local timezone.
    fn now_local(&self) -> DateTime<Local>;

    /// Wall-clock local time without a zone, as entered in forms.
    fn now_naive_local(&self) -> NaiveDateTime {
        self.now_local().naive_local()
    }
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Mock clock for testing with a fixed local wall-clock time.
#[derive(Debug, Clone)]
pub struct MockClock {
    local_time: Arc<Mutex<NaiveDateTime>>,
}

impl MockClock {
    /// Create a new mock clock showing the given local wall-clock time.
    pub fn new(time: NaiveDateTime) -> Self {
        Self {
            local_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: NaiveDateTime) {
        *self.local_time.lock().unwrap() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.local_time.lock().unwrap();
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now_local().with_timezone(&Utc)
    }

    fn now_local(&self) -> DateTime<Local> {
        let naive = *self.local_time.lock().unwrap();
        naive
            .and_local_timezone(Local)
            .earliest()
            .unwrap_or_else(|| naive.and_utc().with_timezone(&Local))
    }

    fn now_naive_local(&self) -> NaiveDateTime {
        *self.local_time.lock().unwrap()
    }
}

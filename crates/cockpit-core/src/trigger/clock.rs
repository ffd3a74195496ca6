//! Injectable time source.

use chrono::{DateTime, Local, NaiveTime, Timelike, Utc};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Wall-clock time of day in the user's local zone.
    fn now_local_time(&self) -> NaiveTime;

    fn now_ms(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }

    /// Minutes since local midnight.
    fn now_local_minutes(&self) -> u32 {
        let t = self.now_local_time();
        t.hour() * 60 + t.minute()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

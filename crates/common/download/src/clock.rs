use chrono::DateTime;
use chrono::Utc;

pub type Timestamp = DateTime<Utc>;

/// Source of the time used to name snapshots and to interpret `Retry-After` dates.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Sync + Send + 'static {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Debug, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

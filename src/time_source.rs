//! Wall clock abstraction so schedule and display logic can be driven by a
//! fixed time in tests.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};

/// Source of local wall-clock time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Real local time of the appliance.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl WallClock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Time left from `now` until `target`, zero if `target` already passed.
pub fn until(now: NaiveDateTime, target: NaiveDateTime) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}


#[cfg(test)]
mod tests {
    use super::testing::parse;
    use super::*;

    #[test]
    fn until_counts_forward() {
        let now = parse("2024-03-01 06:00:00");
        let later = parse("2024-03-01 06:30:00");
        assert_eq!(until(now, later), Duration::from_secs(1800));
    }

    #[test]
    fn until_past_target_is_zero() {
        let now = parse("2024-03-01 06:00:00");
        let earlier = parse("2024-03-01 05:00:00");
        assert_eq!(until(now, earlier), Duration::ZERO);
    }
}

//! Daily flatten scheduling
//!
//! Fires once per calendar day when the wall clock enters the configured
//! cutoff interval `[start, end)`. The caller is responsible for closing
//! the open position and cancelling resident orders; this scheduler only
//! answers "should that happen now" and deduplicates by date so repeated
//! ticks inside the window do not produce repeated exit calls.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

#[derive(Debug, Clone)]
pub struct FlattenScheduler {
    cutoff_start: NaiveTime,
    cutoff_end: NaiveTime,
    last_flatten_date: Option<NaiveDate>,
}

impl FlattenScheduler {
    pub fn new(cutoff_start: NaiveTime, cutoff_end: NaiveTime) -> Self {
        FlattenScheduler {
            cutoff_start,
            cutoff_end,
            last_flatten_date: None,
        }
    }

    /// True while the timestamp is inside the cutoff interval, whether or
    /// not the flatten already fired today. Trading is suspended for the
    /// whole interval.
    pub fn in_cutoff(&self, now: DateTime<Utc>) -> bool {
        let time = now.time();
        time >= self.cutoff_start && time < self.cutoff_end
    }

    /// True on the first in-cutoff tick of a calendar day.
    pub fn should_fire(&self, now: DateTime<Utc>) -> bool {
        self.in_cutoff(now) && self.last_flatten_date != Some(now.date_naive())
    }

    /// Record the firing; at most once per date.
    pub fn mark_fired(&mut self, now: DateTime<Utc>) {
        self.last_flatten_date = Some(now.date_naive());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scheduler() -> FlattenScheduler {
        FlattenScheduler::new(
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 1, 0).unwrap(),
        )
    }

    fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, h, m, s).unwrap()
    }

    #[test]
    fn test_fires_once_per_day() {
        let mut sched = scheduler();

        let first = at(4, 17, 0, 0);
        assert!(sched.should_fire(first));
        sched.mark_fired(first);

        // later ticks inside the same cutoff window do not fire again
        assert!(sched.in_cutoff(at(4, 17, 0, 30)));
        assert!(!sched.should_fire(at(4, 17, 0, 30)));

        // next day fires again
        assert!(sched.should_fire(at(5, 17, 0, 15)));
    }

    #[test]
    fn test_outside_cutoff() {
        let sched = scheduler();
        assert!(!sched.in_cutoff(at(4, 16, 59, 59)));
        assert!(!sched.should_fire(at(4, 16, 59, 59)));
        // end bound is exclusive
        assert!(!sched.in_cutoff(at(4, 17, 1, 0)));
    }
}

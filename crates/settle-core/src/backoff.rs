//! Poll interval scheduling
//!
//! Bounded exponential backoff: the interval starts at the configured floor,
//! doubles after every sleep and stops growing at the cap. A fixed poll
//! interval bypasses the growth entirely. Whatever the schedule says, the
//! interval handed out never exceeds the time left before the deadline.

use std::time::Duration;

use crate::config::{DEFAULT_INITIAL_INTERVAL, WaitConfig};

/// Multiplier applied after each sleep
pub const BACKOFF_FACTOR: u32 = 2;

/// Poll interval schedule for one wait
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    fixed: bool,
}

impl Backoff {
    /// Exponential schedule from `initial` up to `max`
    ///
    /// A zero `initial` falls back to 100ms. When `initial` is above `max`
    /// the floor wins and the schedule stays flat.
    #[must_use]
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        let current = if initial.is_zero() {
            DEFAULT_INITIAL_INTERVAL
        } else {
            initial
        };

        Self {
            current,
            max: max.max(current),
            fixed: false,
        }
    }

    /// Constant schedule
    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self {
            current: interval,
            max: interval,
            fixed: true,
        }
    }

    /// Schedule described by a wait configuration
    #[must_use]
    pub fn from_config(config: &WaitConfig) -> Self {
        match config.poll_interval {
            Some(interval) => Self::fixed(interval.max(config.min_timeout)),
            None => Self::exponential(config.min_timeout, config.max_interval),
        }
    }

    /// Interval the next sleep would use, ignoring the deadline
    #[must_use]
    pub fn peek(&self) -> Duration {
        self.current
    }

    /// Take the next interval, capped at `remaining`, and advance the schedule
    pub fn next_interval(&mut self, remaining: Duration) -> Duration {
        let interval = self.current.min(remaining);

        if !self.fixed {
            self.current = self
                .current
                .saturating_mul(BACKOFF_FACTOR)
                .min(self.max);
        }

        interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_doubles_until_cap() {
        let mut backoff = Backoff::exponential(Duration::from_secs(1), Duration::from_secs(10));

        let intervals: Vec<u64> = (0..6).map(|_| backoff.next_interval(FAR).as_secs()).collect();

        assert_eq!(intervals, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_zero_floor_uses_default() {
        let mut backoff = Backoff::exponential(Duration::ZERO, Duration::from_secs(10));

        assert_eq!(backoff.next_interval(FAR), Duration::from_millis(100));
        assert_eq!(backoff.next_interval(FAR), Duration::from_millis(200));
    }

    #[test]
    fn test_floor_above_cap_stays_flat() {
        let mut backoff = Backoff::exponential(Duration::from_secs(30), Duration::from_secs(10));

        assert_eq!(backoff.next_interval(FAR), Duration::from_secs(30));
        assert_eq!(backoff.next_interval(FAR), Duration::from_secs(30));
    }

    #[test]
    fn test_never_exceeds_remaining() {
        let mut backoff = Backoff::exponential(Duration::from_secs(4), Duration::from_secs(10));

        assert_eq!(
            backoff.next_interval(Duration::from_millis(1500)),
            Duration::from_millis(1500)
        );
        // the schedule still advances
        assert_eq!(backoff.peek(), Duration::from_secs(8));
    }

    #[test]
    fn test_fixed_interval() {
        let mut backoff = Backoff::fixed(Duration::from_millis(250));

        for _ in 0..5 {
            assert_eq!(backoff.next_interval(FAR), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_from_config() {
        let config = WaitConfig::new(["A"], ["B"], Duration::from_secs(60))
            .with_min_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_secs(1));

        // a fixed interval below the floor is raised to it
        assert_eq!(Backoff::from_config(&config).peek(), Duration::from_secs(2));

        let config = WaitConfig::new(["A"], ["B"], Duration::from_secs(60))
            .with_max_interval(Duration::from_secs(3));
        let mut backoff = Backoff::from_config(&config);
        let intervals: Vec<Duration> = (0..7).map(|_| backoff.next_interval(FAR)).collect();
        assert_eq!(intervals[0], Duration::from_millis(100));
        assert_eq!(intervals[6], Duration::from_secs(3));
    }
}

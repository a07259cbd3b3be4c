use crate::core::clock::Clock;
use crate::error::{StatsError, StatsResult};

/// Counts whole fixed intervals elapsed against a [`Clock`].
///
/// The ticker remembers the boundary of the last interval it reported. Each
/// call to [`tick_if_needed`](Self::tick_if_needed) reports how many complete
/// intervals have passed since then and moves the boundary forward by exactly
/// that many intervals, so partial intervals carry over to the next call.
#[derive(Debug)]
pub struct TimeTicker<C>
where
    C: Clock,
{
    clock: C,
    interval: u64,
    last_tick: u64,
}

impl<C> TimeTicker<C>
where
    C: Clock,
{
    /// Creates a ticker whose first interval starts at the clock's current reading.
    pub fn new(interval: u64, clock: C) -> StatsResult<Self> {
        if interval == 0 {
            return Err(StatsError::InvalidTickInterval(interval));
        }

        Ok(Self::with_interval(interval, clock))
    }

    /// Creates a ticker from an interval already known to be non-zero.
    pub(crate) fn with_interval(interval: u64, clock: C) -> Self {
        debug_assert!(interval > 0, "tick interval must be positive");
        let last_tick = clock.now();

        Self {
            clock,
            interval,
            last_tick,
        }
    }

    /// Returns the number of whole intervals elapsed since the last tick and
    /// advances the tick boundary accordingly.
    #[inline]
    pub fn tick_if_needed(&mut self) -> u64 {
        self.tick_if_needed_with(|| {})
    }

    /// Like [`tick_if_needed`](Self::tick_if_needed), invoking `on_tick` once
    /// per elapsed interval.
    ///
    /// A gap spanning `n` intervals fires the callback `n` times. A clock that
    /// moved backwards yields zero ticks.
    pub fn tick_if_needed_with<F>(&mut self, mut on_tick: F) -> u64
    where
        F: FnMut(),
    {
        let now = self.clock.now();
        let ticks = now.saturating_sub(self.last_tick) / self.interval;

        if ticks == 0 {
            return 0;
        }

        self.last_tick += ticks * self.interval;
        for _ in 0..ticks {
            on_tick();
        }

        ticks
    }

    /// Restarts interval counting from the clock's current reading.
    pub fn reset(&mut self) {
        self.last_tick = self.clock.now();
    }

    #[inline]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    #[inline]
    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    #[test]
    fn test_zero_interval_is_rejected() {
        let clock = ManualClock::new(0);
        assert!(matches!(
            TimeTicker::new(0, &clock),
            Err(StatsError::InvalidTickInterval(0))
        ));
    }

    #[test]
    fn test_partial_interval_does_not_tick() {
        let clock = ManualClock::new(0);
        let mut ticker = TimeTicker::new(1_000, &clock).unwrap();

        clock.advance_by(999);
        assert_eq!(ticker.tick_if_needed(), 0);

        clock.advance_by(1);
        assert_eq!(ticker.tick_if_needed(), 1);
        assert_eq!(ticker.last_tick(), 1_000);
    }

    /// A long gap must fire the callback once per elapsed interval.
    #[test]
    fn test_gap_fires_callback_per_interval() {
        let clock = ManualClock::new(0);
        let mut ticker = TimeTicker::new(5_000, &clock).unwrap();
        let mut fired = 0;

        clock.advance_by(5_000 * 7 + 1_200);
        let ticks = ticker.tick_if_needed_with(|| fired += 1);

        assert_eq!(ticks, 7);
        assert_eq!(fired, 7);
        // The remainder carries over.
        assert_eq!(ticker.last_tick(), 35_000);
        clock.advance_by(3_800);
        assert_eq!(ticker.tick_if_needed(), 1);
    }

    #[test]
    fn test_clock_regression_yields_zero_ticks() {
        let clock = ManualClock::new(10_000);
        let mut ticker = TimeTicker::new(1_000, &clock).unwrap();

        clock.set(2_000);
        assert_eq!(ticker.tick_if_needed(), 0);
        assert_eq!(ticker.last_tick(), 10_000);
    }

    #[test]
    fn test_reset_restarts_from_now() {
        let clock = ManualClock::new(0);
        let mut ticker = TimeTicker::new(100, &clock).unwrap();

        clock.advance_by(550);
        ticker.reset();
        assert_eq!(ticker.last_tick(), 550);

        clock.advance_by(99);
        assert_eq!(ticker.tick_if_needed(), 0);
    }
}

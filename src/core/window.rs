//! # Rotating Time Windows
//!
//! A [`SlidingTimeWindow`] splits a span of time into `capacity` fixed-width
//! slices arranged in a ring. The slice for time `now` lives at
//! `floor(now / period) mod capacity`, so the ring rotates on its own as time
//! passes: whenever an access lands on a later period than the last one seen,
//! every slice skipped over is evicted and re-materialized from the window's
//! [`DefaultValue`] on its next visit.
//!
//! Rotation is tracked by absolute period number rather than by ring index.
//! A jump of exactly `capacity` periods lands on the same ring index but is
//! still a full rotation, and a jump longer than the whole span evicts every
//! slice.
use crate::core::clock::Clock;
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The shape of a sliding window: its total span and its slice width, both in
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeWindow")]
pub struct TimeWindow {
    duration: u64,
    period: u64,
}

#[derive(Deserialize)]
struct RawTimeWindow {
    duration: u64,
    period: u64,
}

impl TryFrom<RawTimeWindow> for TimeWindow {
    type Error = StatsError;

    fn try_from(raw: RawTimeWindow) -> Result<Self, Self::Error> {
        TimeWindow::new(raw.duration, raw.period)
    }
}

impl TimeWindow {
    /// Creates a window spanning `duration` in slices of `period`.
    ///
    /// # Errors
    /// Returns [`StatsError::InvalidPeriod`] if `period` is zero.
    pub fn new(duration: u64, period: u64) -> StatsResult<Self> {
        if period == 0 {
            return Err(StatsError::InvalidPeriod { period });
        }

        Ok(Self { duration, period })
    }

    /// Number of slices: `max(1, floor(duration / period))`.
    #[inline]
    pub fn capacity(&self) -> usize {
        ((self.duration / self.period) as usize).max(1)
    }

    #[inline]
    pub fn duration(&self) -> u64 {
        self.duration
    }

    #[inline]
    pub fn period(&self) -> u64 {
        self.period
    }
}

/// How a freshly materialized slice obtains its initial value.
pub enum DefaultValue<T> {
    /// Every slice starts as a clone of this value.
    Constant(T),
    /// Every slice starts with a fresh value from this factory.
    Factory(Box<dyn Fn() -> T>),
}

impl<T> DefaultValue<T> {
    /// Wraps a zero-argument factory.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::Factory(Box::new(factory))
    }
}

impl<T> DefaultValue<T>
where
    T: Clone,
{
    /// Produces the initial value for one slice.
    #[inline]
    pub fn resolve(&self) -> T {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

impl<T> fmt::Debug for DefaultValue<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl<T> Default for DefaultValue<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::Constant(T::default())
    }
}

/// A ring buffer of per-period slices indexed by time.
///
/// Every operation first brings the ring up to date with the clock (see
/// [`rotate_with`](Self::rotate_with)); the `_at` variants take the time
/// explicitly instead of reading the clock.
#[derive(Debug)]
pub struct SlidingTimeWindow<T, C>
where
    C: Clock,
{
    window: TimeWindow,
    slices: Box<[Option<T>]>,
    default: DefaultValue<T>,
    clock: C,
    /// Absolute period number (`floor(now / period)`) of the last rotation.
    epoch: u64,
}

impl<T, C> SlidingTimeWindow<T, C>
where
    T: Clone,
    C: Clock,
{
    pub fn new(window: TimeWindow, default: DefaultValue<T>, clock: C) -> Self {
        let slices = (0..window.capacity())
            .map(|_| None)
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let epoch = clock.now() / window.period;

        Self {
            window,
            slices,
            default,
            clock,
            epoch,
        }
    }

    /// Number of slices in the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    #[inline]
    pub fn time_window(&self) -> TimeWindow {
        self.window
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Ring index owning time `now`.
    #[inline]
    pub fn index_of(&self, now: u64) -> usize {
        ((now / self.window.period) % self.slices.len() as u64) as usize
    }

    /// Ring index owning the clock's current reading.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.index_of(self.clock.now())
    }

    #[inline]
    pub fn rotate(&mut self) -> usize {
        let now = self.clock.now();
        self.rotate_at_with(now, |_| {})
    }

    /// Brings the ring up to date with the clock, handing every evicted slice
    /// to `on_evict`. Returns the number of slices rotated.
    #[inline]
    pub fn rotate_with<F>(&mut self, on_evict: F) -> usize
    where
        F: FnMut(Option<T>),
    {
        let now = self.clock.now();
        self.rotate_at_with(now, on_evict)
    }

    /// Rotates the ring up to time `now`.
    ///
    /// `on_evict` fires once per elapsed slice, oldest first, with the slice's
    /// previous contents (`None` if it was never materialized). A gap longer
    /// than the whole ring evicts each slice exactly once. A `now` earlier
    /// than the last rotation is a no-op.
    pub fn rotate_at_with<F>(&mut self, now: u64, mut on_evict: F) -> usize
    where
        F: FnMut(Option<T>),
    {
        let epoch = now / self.window.period;
        if epoch <= self.epoch {
            return 0;
        }

        let capacity = self.slices.len() as u64;
        let elapsed = epoch - self.epoch;
        let steps = elapsed.min(capacity);

        if elapsed > capacity {
            tracing::debug!(
                elapsed_periods = elapsed,
                capacity,
                "time window fully stale, evicting every slice"
            );
        }

        // Skip straight to the last `steps` periods; anything older wrapped
        // onto the same slices and carries nothing.
        let first = epoch - steps + 1;
        for period in first..=epoch {
            let index = (period % capacity) as usize;
            on_evict(self.slices[index].take());
        }

        tracing::trace!(from = self.epoch, to = epoch, rotated = steps, "time window rotated");
        self.epoch = epoch;

        steps as usize
    }

    /// Returns the slice for the current time, materializing it if needed.
    #[inline]
    pub fn current(&mut self) -> &mut T {
        let now = self.clock.now();
        self.current_at(now)
    }

    pub fn current_at(&mut self, now: u64) -> &mut T {
        self.rotate_at_with(now, |_| {});
        let index = self.epoch_index();
        self.materialize(index)
    }

    /// Returns the slice `offset` steps away from the current one.
    ///
    /// `get(0)` is the current slice, `get(-1)` the previous one, and
    /// `get(i)` and `get(i - len)` name the same slice. Offsets outside
    /// `[-len, len)` yield `None`.
    #[inline]
    pub fn get(&mut self, offset: isize) -> Option<&T> {
        let now = self.clock.now();
        self.get_at(offset, now)
    }

    pub fn get_at(&mut self, offset: isize, now: u64) -> Option<&T> {
        let len = self.slices.len() as isize;
        if offset < -len || offset >= len {
            return None;
        }

        self.rotate_at_with(now, |_| {});
        let current = self.epoch_index() as isize;
        let index = (current + offset).rem_euclid(len) as usize;

        Some(self.materialize(index))
    }

    /// Visits every slice from oldest to newest, stopping early when `visit`
    /// returns `false`.
    #[inline]
    pub fn for_each<F>(&mut self, visit: F)
    where
        F: FnMut(&T) -> bool,
    {
        let now = self.clock.now();
        self.for_each_at(now, visit)
    }

    pub fn for_each_at<F>(&mut self, now: u64, mut visit: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.rotate_at_with(now, |_| {});
        let len = self.slices.len();
        let oldest = (self.epoch_index() + 1) % len;

        for step in 0..len {
            let index = (oldest + step) % len;
            if !visit(self.materialize(index)) {
                break;
            }
        }
    }

    /// Slices that currently hold a value, oldest to newest, without rotating.
    pub fn materialized(&self) -> impl Iterator<Item = &T> + '_ {
        let len = self.slices.len();
        let oldest = (self.epoch_index() + 1) % len;

        (0..len).filter_map(move |step| self.slices[(oldest + step) % len].as_ref())
    }

    /// Drops every slice and restarts the ring at the current time.
    pub fn reset(&mut self) {
        self.slices.iter_mut().for_each(|slice| *slice = None);
        self.epoch = self.clock.now() / self.window.period;
    }

    /// Ring index of the last rotated period. Accesses with a regressed clock
    /// land here rather than on an older slot.
    #[inline]
    fn epoch_index(&self) -> usize {
        (self.epoch % self.slices.len() as u64) as usize
    }

    #[inline]
    fn materialize(&mut self, index: usize) -> &mut T {
        let default = &self.default;
        self.slices[index].get_or_insert_with(|| default.resolve())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_window(clock: &ManualClock) -> SlidingTimeWindow<u64, &ManualClock> {
        let time_window = TimeWindow::new(5_000, 1_000).unwrap();
        SlidingTimeWindow::new(time_window, DefaultValue::Constant(0), clock)
    }

    #[test]
    fn test_capacity_is_at_least_one() {
        assert_eq!(TimeWindow::new(10_000, 1_000).unwrap().capacity(), 10);
        assert_eq!(TimeWindow::new(2_500, 1_000).unwrap().capacity(), 2);
        assert_eq!(TimeWindow::new(500, 1_000).unwrap().capacity(), 1);
        assert!(matches!(
            TimeWindow::new(1_000, 0),
            Err(StatsError::InvalidPeriod { period: 0 })
        ));
    }

    #[test]
    fn test_time_window_deserialization_validates() {
        let time_window: TimeWindow = serde_json::from_str("{\"duration\":60000,\"period\":1000}")
            .expect("valid time window");
        assert_eq!(time_window.capacity(), 60);
    }

    #[test]
    fn test_zero_period_deserialization_fails() {
        let parsed = serde_json::from_str::<TimeWindow>("{\"duration\":60000,\"period\":0}");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_index_symmetry_and_bounds() {
        let clock = ManualClock::new(12_345);
        let mut window = counting_window(&clock);
        let len = window.len() as isize;

        for (n, offset) in (0..len).enumerate() {
            *window.current() += n as u64;
            let forward = window.get(offset).copied();
            let backward = window.get(offset - len).copied();
            assert_eq!(forward, backward);
            clock.advance_by(1_000);
        }

        assert!(window.get(len).is_none());
        assert!(window.get(-len - 1).is_none());
        assert!(window.get(-len).is_some());
    }

    /// A jump of exactly `len * period + 1` lands on the same ring slot but the
    /// slot must be treated as fully stale.
    #[test]
    fn test_full_span_jump_returns_to_same_slice() {
        let clock = ManualClock::new(3_200);
        let mut window = counting_window(&clock);

        *window.current() = 42;
        let before = window.current_index();

        clock.advance_by(5 * 1_000 + 1);

        assert_eq!(window.current_index(), before);
        assert_eq!(*window.current(), 0);
    }

    #[test]
    fn test_rotation_notifies_once_per_elapsed_slice() {
        let clock = ManualClock::new(0);
        let mut window = counting_window(&clock);

        *window.current() = 1;
        clock.advance_by(1_000);
        *window.current() = 2;
        clock.advance_by(1_000);
        *window.current() = 3;

        clock.advance_by(3_000);
        let mut evicted = Vec::new();
        let rotated = window.rotate_with(|slice| evicted.push(slice));

        assert_eq!(rotated, 3);
        // Slots 3 and 4 were never written, slot 0 held the first value.
        assert_eq!(evicted, vec![None, None, Some(1)]);
    }

    #[test]
    fn test_huge_gap_evicts_each_slice_once() {
        let clock = ManualClock::new(0);
        let mut window = counting_window(&clock);

        for _ in 0..5 {
            *window.current() += 1;
            clock.advance_by(1_000);
        }

        clock.advance_by(1_000_000);
        let mut notifications = 0;
        let rotated = window.rotate_with(|_| notifications += 1);

        assert_eq!(rotated, 5);
        assert_eq!(notifications, 5);
        assert_eq!(window.materialized().count(), 0);
    }

    #[test]
    fn test_clock_regression_is_absorbed() {
        let clock = ManualClock::new(10_000);
        let mut window = counting_window(&clock);

        *window.current() = 7;
        clock.set(4_000);

        assert_eq!(window.rotate(), 0);
        assert_eq!(window.materialized().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_for_each_is_oldest_to_newest_and_halts() {
        let clock = ManualClock::new(0);
        let mut window = counting_window(&clock);

        for value in 1..=5 {
            *window.current() = value;
            clock.advance_by(1_000);
        }
        clock.set(4_999);

        let mut seen = Vec::new();
        window.for_each(|value| {
            seen.push(*value);
            true
        });
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);

        let mut first_two = Vec::new();
        window.for_each(|value| {
            first_two.push(*value);
            first_two.len() < 2
        });
        assert_eq!(first_two, vec![1, 2]);
    }

    #[test]
    fn test_factory_runs_once_per_fresh_slice() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let clock = ManualClock::new(0);
        let time_window = TimeWindow::new(3_000, 1_000).unwrap();
        let mut window = SlidingTimeWindow::new(
            time_window,
            DefaultValue::factory(move || {
                counter.set(counter.get() + 1);
                Vec::<u64>::new()
            }),
            &clock,
        );

        window.current().push(1);
        window.current().push(2);
        assert_eq!(calls.get(), 1);

        clock.advance_by(1_000);
        window.current().push(3);
        assert_eq!(calls.get(), 2);

        clock.advance_by(3_000);
        assert!(window.current().is_empty());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_reset_drops_all_slices() {
        let clock = ManualClock::new(0);
        let mut window = counting_window(&clock);

        *window.current() = 9;
        window.reset();

        assert_eq!(window.materialized().count(), 0);
        assert_eq!(*window.current(), 0);
    }
}

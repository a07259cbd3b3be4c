//! # Rolling Extrema
//!
//! Sliding-window maximum (or minimum) over the last `window_size` values in
//! amortized O(1) per insertion.
//!
//! The window keeps a deque of `(index, value)` pairs whose values are strictly
//! decreasing under the window's [`Comparator`]. A new value first pops every
//! entry it beats or ties from the back, so the front is always the extremum of
//! the live range. Entries whose index falls out of range are dropped from the
//! front.
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Orders values so that the rolling extremum is the greatest one.
pub trait Comparator<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Natural ordering: the window tracks its maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxOrder;

/// Reversed natural ordering: the window tracks its minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinOrder;

impl<T> Comparator<T> for MaxOrder
where
    T: PartialOrd,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Equal)
    }
}

impl<T> Comparator<T> for MinOrder
where
    T: PartialOrd,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        b.partial_cmp(a).unwrap_or(Ordering::Equal)
    }
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Configuration parameters for a [`RollingExtremum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingOptions {
    /// Report nothing until the window has seen `window_size` values.
    pub wait_full_range: bool,
}

impl Default for RollingOptions {
    fn default() -> Self {
        Self {
            wait_full_range: true,
        }
    }
}

/// Sliding-window extremum under an arbitrary ordering.
#[derive(Debug, Clone)]
pub struct RollingExtremum<T, O> {
    window_size: u64,
    options: RollingOptions,
    order: O,
    deque: VecDeque<(u64, T)>,
    index: u64,
}

pub type RollingMax<T> = RollingExtremum<T, MaxOrder>;

pub type RollingMin<T> = RollingExtremum<T, MinOrder>;

impl<T, O> RollingExtremum<T, O>
where
    T: Clone,
    O: Comparator<T> + Default,
{
    pub fn new(window_size: usize, options: RollingOptions) -> StatsResult<Self> {
        Self::with_comparator(window_size, options, O::default())
    }
}

impl<T, O> RollingExtremum<T, O>
where
    T: Clone,
    O: Comparator<T>,
{
    /// Creates a window ordered by `order`, for payloads without a natural order.
    ///
    /// # Errors
    /// Fails if `window_size` is zero.
    pub fn with_comparator(window_size: usize, options: RollingOptions, order: O) -> StatsResult<Self> {
        if window_size == 0 {
            return Err(StatsError::ZeroWindowSize);
        }

        Ok(Self {
            window_size: window_size as u64,
            options,
            order,
            deque: VecDeque::with_capacity(window_size),
            index: 0,
        })
    }

    /// Pushes `value` and returns the extremum of the last `window_size` values.
    ///
    /// Returns `None` while the window is still filling and
    /// [`RollingOptions::wait_full_range`] is set.
    pub fn add(&mut self, value: T) -> Option<T> {
        while let Some((_, back)) = self.deque.back() {
            if self.order.compare(back, &value) == Ordering::Greater {
                break;
            }
            self.deque.pop_back();
        }

        let index = self.index;
        self.deque.push_back((index, value));

        while let Some(&(front, _)) = self.deque.front() {
            if front + self.window_size > index {
                break;
            }
            self.deque.pop_front();
        }

        self.index += 1;

        if self.options.wait_full_range && !self.is_full() {
            return None;
        }

        self.deque.front().map(|(_, value)| value.clone())
    }

    /// Extremum of the values currently in range, ignoring `wait_full_range`.
    #[inline]
    pub fn current(&self) -> Option<&T> {
        self.deque.front().map(|(_, value)| value)
    }

    /// Number of values currently in range.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.min(self.window_size) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index == 0
    }

    /// Whether `window_size` values have been seen.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.index >= self.window_size
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window_size as usize
    }

    pub fn reset(&mut self) {
        self.deque.clear();
        self.index = 0;
    }
}

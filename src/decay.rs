use crate::core::clock::Clock;
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Upper bound on the number of chunks a rolling window is split into.
pub const MAX_CHUNKS: usize = 1_000;

/// Default lower bound on a chunk's invalidation interval, in milliseconds.
pub const DEFAULT_MIN_INVALIDATION_INTERVAL: u64 = 100;

/// Configuration parameters for a [`SmoothlyDecayingRollingCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayingCounterConfig {
    /// Rolling window span in milliseconds.
    pub window: u64,
    /// Number of chunks the window is split into, in `[2, MAX_CHUNKS]`.
    pub chunk_count: usize,
    /// Smallest allowed `window / chunk_count`, in milliseconds.
    pub min_invalidation_interval: u64,
}

impl DecayingCounterConfig {
    pub fn new(window: u64, chunk_count: usize) -> Self {
        Self {
            window,
            chunk_count,
            min_invalidation_interval: DEFAULT_MIN_INVALIDATION_INTERVAL,
        }
    }
}

impl Default for DecayingCounterConfig {
    fn default() -> Self {
        Self::new(60_000, 10)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Chunk {
    /// Start of the interval this chunk currently holds.
    start: u64,
    amount: u64,
}

/// A rolling-window counter whose oldest chunk fades out linearly instead of
/// dropping off at a bucket boundary.
///
/// The window of `W` milliseconds is split into `n` chunks of `I = W / n`
/// milliseconds, backed by `n + 1` ring slots so the chunk being faded out
/// never shares a slot with the chunk being filled. A chunk that started `age`
/// milliseconds ago contributes:
///
/// - its full amount while `age < W`,
/// - `amount * (W + I - age) / I` while `W <= age < W + I`,
/// - nothing afterwards.
#[derive(Debug)]
pub struct SmoothlyDecayingRollingCounter<C>
where
    C: Clock,
{
    window: u64,
    interval: u64,
    chunks: Box<[Chunk]>,
    clock: C,
}

impl<C> SmoothlyDecayingRollingCounter<C>
where
    C: Clock,
{
    /// # Errors
    /// Returns [`StatsError::ChunkCountOutOfRange`] if the chunk count is outside
    /// `[2, MAX_CHUNKS]`, or [`StatsError::InvalidationIntervalTooShort`] if
    /// `window / chunk_count` is below the configured minimum.
    pub fn new(config: DecayingCounterConfig, clock: C) -> StatsResult<Self> {
        if !(2..=MAX_CHUNKS).contains(&config.chunk_count) {
            return Err(StatsError::ChunkCountOutOfRange {
                count: config.chunk_count,
                max: MAX_CHUNKS,
            });
        }

        let interval = config.window / config.chunk_count as u64;
        if interval == 0 || interval < config.min_invalidation_interval {
            return Err(StatsError::InvalidationIntervalTooShort {
                interval,
                minimum: config.min_invalidation_interval,
            });
        }

        let chunks = vec![Chunk::default(); config.chunk_count + 1].into_boxed_slice();

        Ok(Self {
            window: config.window,
            interval,
            chunks,
            clock,
        })
    }

    #[inline]
    pub fn add(&mut self, amount: u64) {
        let now = self.clock.now();
        self.add_at(amount, now);
    }

    /// Adds `amount` to the chunk owning `timestamp`.
    ///
    /// A slot still holding an earlier interval is recycled. That interval
    /// is at least a full window plus one chunk older, so it has faded out.
    /// A late sample whose interval is older than the one its slot already
    /// holds is dropped, since it would count as faded by then.
    pub fn add_at(&mut self, amount: u64, timestamp: u64) {
        let start = timestamp - timestamp % self.interval;
        let slot = ((timestamp / self.interval) % self.chunks.len() as u64) as usize;
        let chunk = &mut self.chunks[slot];

        match start.cmp(&chunk.start) {
            Ordering::Less => return,
            Ordering::Greater => {
                chunk.start = start;
                chunk.amount = 0;
            }
            Ordering::Equal => {}
        }
        chunk.amount = chunk.amount.saturating_add(amount);
    }

    #[inline]
    pub fn sum(&self) -> u64 {
        self.sum_at(self.clock.now())
    }

    /// The decayed total as seen at `timestamp`.
    pub fn sum_at(&self, timestamp: u64) -> u64 {
        self.chunks
            .iter()
            .map(|chunk| self.weigh(chunk, timestamp))
            .fold(0u64, u64::saturating_add)
    }

    pub fn reset(&mut self) {
        self.chunks.fill(Chunk::default());
    }

    #[inline]
    pub fn window(&self) -> u64 {
        self.window
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len() - 1
    }

    fn weigh(&self, chunk: &Chunk, timestamp: u64) -> u64 {
        let age = timestamp.saturating_sub(chunk.start);
        let fade_end = self.window + self.interval;

        if age < self.window {
            chunk.amount
        } else if age < fade_end {
            let remaining = (fade_end - age) as u128;
            (chunk.amount as u128 * remaining / self.interval as u128) as u64
        } else {
            0
        }
    }
}

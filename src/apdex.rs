//! # Apdex Scoring
//!
//! Buckets response times against a target threshold `T`:
//!
//! | Bucket     | Condition            |
//! |------------|----------------------|
//! | satisfied  | `t <= T`             |
//! | tolerated  | `T < t < 4T`         |
//! | frustrated | `t >= 4T`            |
//!
//! and scores them as `(satisfied + tolerated / 2) / total`.
use crate::error::{StatsError, StatsResult};
use serde::Serialize;

/// Serialized form of an [`ApdexCalculator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ApdexSnapshot {
    pub threshold: u64,
    pub satisfied: u64,
    pub tolerated: u64,
    pub frustrated: u64,
    pub total: u64,
    pub score: f64,
}

/// Application Performance Index counters for one threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApdexCalculator {
    threshold: u64,
    satisfied: u64,
    tolerated: u64,
    frustrated: u64,
    total: u64,
}

impl ApdexCalculator {
    /// `threshold` is the satisfied target in milliseconds.
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            satisfied: 0,
            tolerated: 0,
            frustrated: 0,
            total: 0,
        }
    }

    /// Buckets one response time, in milliseconds.
    pub fn update(&mut self, elapsed: u64) {
        self.total += 1;

        if elapsed <= self.threshold {
            self.satisfied += 1;
        } else if elapsed < self.threshold.saturating_mul(4) {
            self.tolerated += 1;
        } else {
            self.frustrated += 1;
        }
    }

    /// The Apdex score in `[0, 1]`, or `0` before any update.
    pub fn score(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        (self.satisfied as f64 + self.tolerated as f64 / 2.0) / self.total as f64
    }

    /// Adds `other`'s counters into this calculator.
    ///
    /// # Errors
    /// Fails if the thresholds differ.
    pub fn merge(&mut self, other: &ApdexCalculator) -> StatsResult<()> {
        self.ensure_same_threshold(other)?;

        self.satisfied += other.satisfied;
        self.tolerated += other.tolerated;
        self.frustrated += other.frustrated;
        self.total += other.total;

        Ok(())
    }

    /// Removes `other`'s counters from this calculator, clamping each at zero.
    ///
    /// If `other` holds more samples than this calculator the two cannot
    /// describe overlapping data and this calculator is reset instead.
    ///
    /// # Errors
    /// Fails if the thresholds differ.
    pub fn subtract(&mut self, other: &ApdexCalculator) -> StatsResult<()> {
        self.ensure_same_threshold(other)?;

        if other.total > self.total {
            tracing::debug!(
                total = self.total,
                other_total = other.total,
                "apdex subtrahend exceeds total, resetting"
            );
            self.reset();
            return Ok(());
        }

        self.satisfied = self.satisfied.saturating_sub(other.satisfied);
        self.tolerated = self.tolerated.saturating_sub(other.tolerated);
        self.frustrated = self.frustrated.saturating_sub(other.frustrated);
        self.total -= other.total;

        Ok(())
    }

    pub fn reset(&mut self) {
        self.satisfied = 0;
        self.tolerated = 0;
        self.frustrated = 0;
        self.total = 0;
    }

    pub fn snapshot(&self) -> ApdexSnapshot {
        ApdexSnapshot {
            threshold: self.threshold,
            satisfied: self.satisfied,
            tolerated: self.tolerated,
            frustrated: self.frustrated,
            total: self.total,
            score: self.score(),
        }
    }

    #[inline]
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    #[inline]
    pub fn satisfied(&self) -> u64 {
        self.satisfied
    }

    #[inline]
    pub fn tolerated(&self) -> u64 {
        self.tolerated
    }

    #[inline]
    pub fn frustrated(&self) -> u64 {
        self.frustrated
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    fn ensure_same_threshold(&self, other: &ApdexCalculator) -> StatsResult<()> {
        if self.threshold != other.threshold {
            return Err(StatsError::ThresholdMismatch {
                expected: self.threshold,
                actual: other.threshold,
            });
        }

        Ok(())
    }
}

//! # Smoothed Z-Score Peak Detection
//!
//! Flags samples that sit more than `threshold` standard deviations away from
//! the running mean of the series seen so far.
//!
//! ## Warm-up
//! For the first `lag` milliseconds every sample is fed into the running
//! distribution unconditionally and the signal stays neutral.
//!
//! ## Influence
//! After warm-up a flagged sample is smoothed to
//! `influence * value + (1 - influence) * previous`, where `previous` is the
//! last smoothed sample. Unflagged samples keep their raw value. The smoothed
//! value then replaces `previous` in the distribution, so its size is fixed
//! once warm-up ends and a burst of outliers does not immediately become the
//! new normal.
use crate::core::clock::Clock;
use crate::core::estimator::OnlineNormalEstimator;
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};

/// Direction of a detected peak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i8")]
pub enum Signal {
    Negative,
    #[default]
    Neutral,
    Positive,
}

impl Signal {
    /// `-1`, `0` or `1`.
    #[inline]
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Negative => -1,
            Self::Neutral => 0,
            Self::Positive => 1,
        }
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal.as_i8()
    }
}

/// A timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds.
    pub timestamp: u64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: u64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Configuration parameters for peak detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakDetectorConfig {
    /// Warm-up span in milliseconds.
    pub lag: u64,
    /// Z-score above which a sample is flagged.
    pub threshold: f64,
    /// Weight of a flagged sample in the running distribution, in `[0, 1]`.
    pub influence: f64,
}

impl PeakDetectorConfig {
    pub fn new(lag: u64, threshold: f64, influence: f64) -> Self {
        Self {
            lag,
            threshold,
            influence,
        }
    }

    /// # Errors
    /// Rejects a negative or NaN threshold and an influence outside `[0, 1]`.
    pub fn validate(&self) -> StatsResult<()> {
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(StatsError::InvalidThreshold(self.threshold));
        }
        if !(0.0..=1.0).contains(&self.influence) {
            return Err(StatsError::InfluenceOutOfRange(self.influence));
        }

        Ok(())
    }
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            lag: 60_000,
            threshold: 3.5,
            influence: 0.5,
        }
    }
}

/// The detection state shared by the batch and streaming detectors.
#[derive(Debug, Clone)]
struct ZScore {
    config: PeakDetectorConfig,
    estimator: OnlineNormalEstimator,
    lag_end: u64,
    smoothed: Option<f64>,
    signal: Signal,
}

impl ZScore {
    fn new(config: PeakDetectorConfig, start: u64) -> Self {
        Self {
            config,
            estimator: OnlineNormalEstimator::new(),
            lag_end: start.saturating_add(config.lag),
            smoothed: None,
            signal: Signal::Neutral,
        }
    }

    fn observe(&mut self, value: f64, now: u64) -> Signal {
        let previous = match self.smoothed {
            // Still warming up, or nothing seen yet to compare against: the
            // sample only seeds the baseline.
            Some(previous) if now >= self.lag_end => previous,
            _ => {
                self.estimator.add(value);
                self.smoothed = Some(value);
                self.signal = Signal::Neutral;
                return self.signal;
            }
        };

        let mean = self.estimator.mean();
        let std_dev = self.estimator.std_dev();
        let influence = self.config.influence;

        let (signal, smoothed) = if (value - mean).abs() > self.config.threshold * std_dev {
            let signal = if value > mean {
                Signal::Positive
            } else {
                Signal::Negative
            };
            (signal, influence * value + (1.0 - influence) * previous)
        } else {
            (Signal::Neutral, value)
        };

        self.estimator.replace(previous, smoothed);
        self.smoothed = Some(smoothed);
        self.signal = signal;

        signal
    }

    fn restart(&mut self, start: u64) {
        *self = Self::new(self.config, start);
    }
}

/// Streaming peak detector whose warm-up starts at construction time.
#[derive(Debug)]
pub struct PeakDetector<C>
where
    C: Clock,
{
    state: ZScore,
    clock: C,
}

impl<C> PeakDetector<C>
where
    C: Clock,
{
    pub fn new(config: PeakDetectorConfig, clock: C) -> StatsResult<Self> {
        config.validate()?;
        let state = ZScore::new(config, clock.now());

        Ok(Self { state, clock })
    }

    /// Classifies `value` at the clock's current reading.
    #[inline]
    pub fn update(&mut self, value: f64) -> Signal {
        let now = self.clock.now();
        self.state.observe(value, now)
    }

    /// Classifies `value` observed at `timestamp`.
    #[inline]
    pub fn update_at(&mut self, value: f64, timestamp: u64) -> Signal {
        self.state.observe(value, timestamp)
    }

    /// The most recent signal.
    #[inline]
    pub fn signal(&self) -> Signal {
        self.state.signal
    }

    #[inline]
    pub fn is_warming_up(&self) -> bool {
        self.clock.now() < self.state.lag_end
    }

    /// Mean of the smoothed series.
    #[inline]
    pub fn mean(&self) -> f64 {
        self.state.estimator.mean()
    }

    /// Standard deviation of the smoothed series.
    #[inline]
    pub fn std_dev(&self) -> f64 {
        self.state.estimator.std_dev()
    }

    /// Number of values in the baseline distribution.
    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.state.estimator.count()
    }

    #[inline]
    pub fn config(&self) -> PeakDetectorConfig {
        self.state.config
    }

    /// Forgets all history and starts a new warm-up at the current time.
    pub fn reset(&mut self) {
        self.state.restart(self.clock.now());
    }
}

/// Classifies a recorded series in one pass. Warm-up is measured from the
/// first sample's timestamp.
///
/// # Errors
/// Fails if `config` is invalid.
pub fn detect_peaks(samples: &[Sample], config: PeakDetectorConfig) -> StatsResult<Vec<Signal>> {
    config.validate()?;

    let Some(first) = samples.first() else {
        return Ok(Vec::new());
    };

    let mut state = ZScore::new(config, first.timestamp);
    let signals = samples
        .iter()
        .map(|sample| state.observe(sample.value, sample.timestamp))
        .collect();

    Ok(signals)
}

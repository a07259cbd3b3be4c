//! Real-time statistics primitives.
//!
//! Every component is single-threaded and driven by an injected [`Clock`], so
//! its output is a deterministic function of its prior state and the current
//! time:
//!
//! - [`SlidingTimeWindow`] and the [`WindowedAggregator`] built on it
//! - [`Ewma`] and the 1/5/15-minute [`Meter`]
//! - smoothed z-score [`PeakDetector`]s and [`detect_peaks`]
//! - MAD, IQR and sigma [`outlier`] filters
//! - [`ApdexCalculator`]
//! - [`RollingMax`] / [`RollingMin`]
//! - [`SmoothlyDecayingRollingCounter`]
//! - mergeable [`HistogramSnapshot`]s
//!
//! Callers that share an instance between threads must serialize access to it.
pub use crate::aggregator::{AggregateKind, AggregatorCatalog, WindowedAggregator};
pub use crate::apdex::{ApdexCalculator, ApdexSnapshot};
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::estimator::{EstimatorSnapshot, OnlineNormalEstimator};
pub use crate::core::ticker::TimeTicker;
pub use crate::core::window::{DefaultValue, SlidingTimeWindow, TimeWindow};
pub use crate::decay::{DecayingCounterConfig, SmoothlyDecayingRollingCounter};
pub use crate::detector::{PeakDetector, PeakDetectorConfig, Sample, Signal, detect_peaks};
pub use crate::error::{StatsError, StatsResult};
pub use crate::ewma::{Ewma, RateUnit};
pub use crate::histogram::{
    HistogramAccumulator, HistogramSnapshot, SnapshotOptions, aggregate_histograms,
    aggregate_histograms_lossy, get_histogram_snapshot,
};
pub use crate::meter::{Meter, MeterConfig, MeterSnapshot};
pub use crate::outlier::{OutlierFilter, OutlierMethod};
pub use crate::rolling::{RollingExtremum, RollingMax, RollingMin, RollingOptions};

pub mod aggregator;
pub mod apdex;
pub mod core;
pub mod decay;
pub mod detector;
pub mod error;
pub mod ewma;
pub mod histogram;
pub mod meter;
pub mod outlier;
pub mod rolling;

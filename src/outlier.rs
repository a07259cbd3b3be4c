//! # Outlier Filters
//!
//! Each [`OutlierMethod`] is compiled against a data set into an
//! [`OutlierFilter`], which holds the statistics it needs so that testing a
//! single value is a constant-time comparison.
//!
//! - **MAD:** flags `|x - median| > threshold * MAD / 0.6745`.
//! - **IQR:** flags `|x - median| > 1.5 * (Q3 - Q1)`, with linearly
//!   interpolated quartiles.
//! - **Sigma:** flags `|x - mean| > threshold * stddev` (population stddev).
use crate::core::estimator::OnlineNormalEstimator;
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};

/// Scales MAD to a consistent estimator of the standard deviation for normal data.
const MAD_SCALE: f64 = 0.6745;

const IQR_FENCE: f64 = 1.5;

pub const DEFAULT_MAD_THRESHOLD: f64 = 3.0;

pub const DEFAULT_SIGMA_THRESHOLD: f64 = 3.5;

/// Outlier classification strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum OutlierMethod {
    Mad { threshold: f64 },
    Iqr,
    Sigma { threshold: f64 },
}

impl OutlierMethod {
    pub fn mad() -> Self {
        Self::Mad {
            threshold: DEFAULT_MAD_THRESHOLD,
        }
    }

    pub fn sigma() -> Self {
        Self::Sigma {
            threshold: DEFAULT_SIGMA_THRESHOLD,
        }
    }
}

impl Default for OutlierMethod {
    fn default() -> Self {
        Self::mad()
    }
}

/// An outlier predicate with precomputed statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierFilter {
    Mad { median: f64, bound: f64 },
    Iqr { median: f64, bound: f64 },
    Sigma { mean: f64, bound: f64 },
}

impl OutlierFilter {
    /// Precomputes `method`'s statistics over `values`.
    ///
    /// Returns `None` for empty input, which has no outliers.
    pub fn new(method: OutlierMethod, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let filter = match method {
            OutlierMethod::Mad { threshold } => {
                let mut sorted = sorted_copy(values);
                let median = interpolate(&sorted, 0.5);
                for value in sorted.iter_mut() {
                    *value = (*value - median).abs();
                }
                sorted.sort_unstable_by(f64::total_cmp);
                let mad = interpolate(&sorted, 0.5);

                Self::Mad {
                    median,
                    bound: threshold * mad / MAD_SCALE,
                }
            }
            OutlierMethod::Iqr => {
                let sorted = sorted_copy(values);
                let q1 = interpolate(&sorted, 0.25);
                let q3 = interpolate(&sorted, 0.75);

                Self::Iqr {
                    median: interpolate(&sorted, 0.5),
                    bound: IQR_FENCE * (q3 - q1),
                }
            }
            OutlierMethod::Sigma { threshold } => {
                let estimator: OnlineNormalEstimator = values.iter().copied().collect();

                Self::Sigma {
                    mean: estimator.mean(),
                    bound: threshold * estimator.std_dev(),
                }
            }
        };

        Some(filter)
    }

    #[inline]
    pub fn is_outlier(&self, value: f64) -> bool {
        match *self {
            Self::Mad { median, bound } | Self::Iqr { median, bound } => {
                (value - median).abs() > bound
            }
            Self::Sigma { mean, bound } => (value - mean).abs() > bound,
        }
    }
}

/// Median of `values`, averaging the middle pair for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(interpolate(&sorted_copy(values), 0.5))
}

/// Median absolute deviation from the median.
pub fn mad(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|value| (value - center).abs()).collect();

    median(&deviations)
}

/// The `q`-quantile of `values` with linear interpolation between closest
/// ranks. Pass `sorted = true` to skip sorting input already in ascending order.
///
/// # Errors
/// Returns [`StatsError::QuantileOutOfRange`] if `q` is NaN or outside `[0, 1]`.
pub fn quantile(values: &[f64], q: f64, sorted: bool) -> StatsResult<Option<f64>> {
    if !(0.0..=1.0).contains(&q) {
        return Err(StatsError::QuantileOutOfRange(q));
    }
    if values.is_empty() {
        return Ok(None);
    }

    let value = if sorted {
        interpolate(values, q)
    } else {
        interpolate(&sorted_copy(values), q)
    };

    Ok(Some(value))
}

/// Positions of the outliers in `values`, in ascending order.
pub fn outlier_indices(values: &[f64], method: OutlierMethod) -> Vec<usize> {
    let Some(filter) = OutlierFilter::new(method, values) else {
        return Vec::new();
    };

    values
        .iter()
        .enumerate()
        .filter(|(_, value)| filter.is_outlier(**value))
        .map(|(index, _)| index)
        .collect()
}

/// `values` without its outliers, order preserved.
pub fn filter_outliers(values: &[f64], method: OutlierMethod) -> Vec<f64> {
    let Some(filter) = OutlierFilter::new(method, values) else {
        return Vec::new();
    };

    values
        .iter()
        .copied()
        .filter(|value| !filter.is_outlier(*value))
        .collect()
}

/// The items whose `accessor` value is not an outlier, order preserved.
pub fn filter_outliers_by<'a, T, F>(items: &'a [T], method: OutlierMethod, accessor: F) -> Vec<&'a T>
where
    F: Fn(&T) -> f64,
{
    let values: Vec<f64> = items.iter().map(accessor).collect();
    let Some(filter) = OutlierFilter::new(method, &values) else {
        return Vec::new();
    };

    items
        .iter()
        .zip(values)
        .filter(|(_, value)| !filter.is_outlier(*value))
        .map(|(item, _)| item)
        .collect()
}

/// Splits `values` into `(inliers, outliers)`, each in input order.
pub fn partition_outliers(values: &[f64], method: OutlierMethod) -> (Vec<f64>, Vec<f64>) {
    match OutlierFilter::new(method, values) {
        Some(filter) => values
            .iter()
            .copied()
            .partition(|value| !filter.is_outlier(*value)),
        None => (Vec::new(), Vec::new()),
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    sorted
}

/// Linear interpolation at rank `(n - 1) * q`. `sorted` must be non-empty.
fn interpolate(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;

    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

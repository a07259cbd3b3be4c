use serde::Serialize;

/// Streaming mean and variance using Welford's algorithm.
///
/// Besides adding samples, the estimator can forget a previously added
/// sample, swap one sample for another, and merge or subtract whole
/// estimators, which lets windowed consumers keep a running distribution
/// without re-scanning their history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OnlineNormalEstimator {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
}

/// A point-in-time view of an [`OnlineNormalEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatorSnapshot {
    pub count: u64,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl OnlineNormalEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sample.
    #[inline]
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Forgets a sample previously passed to [`add`](Self::add).
    ///
    /// Removing the last remaining sample resets the estimator.
    pub fn remove(&mut self, value: f64) {
        match self.count {
            0 => {}
            1 => self.reset(),
            count => {
                let remaining = (count - 1) as f64;
                let mean = (self.mean * count as f64 - value) / remaining;
                self.m2 = (self.m2 - (value - mean) * (value - self.mean)).max(0.0);
                self.mean = mean;
                self.count -= 1;
            }
        }
    }

    /// Swaps a previously added sample for a new one, keeping the count.
    #[inline]
    pub fn replace(&mut self, old: f64, new: f64) {
        if self.count == 0 {
            self.add(new);
            return;
        }

        self.remove(old);
        self.add(new);
    }

    /// Folds every sample of `other` into this estimator (Chan et al.).
    pub fn merge(&mut self, other: &OnlineNormalEstimator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let weight = (self.count as f64 * other.count as f64) / count as f64;

        self.mean += delta * other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * weight;
        self.count = count;
    }

    /// Removes the samples of `other`, which must be a subset of the samples
    /// of this estimator. Subtracting as many or more samples than this
    /// estimator holds leaves it empty.
    pub fn subtract(&mut self, other: &OnlineNormalEstimator) {
        if other.count == 0 {
            return;
        }
        if other.count >= self.count {
            tracing::debug!(
                count = self.count,
                subtracted = other.count,
                "estimator subtract consumed every sample"
            );
            self.reset();
            return;
        }

        let count = self.count - other.count;
        let mean = (self.mean * self.count as f64 - other.mean * other.count as f64) / count as f64;
        let delta = other.mean - mean;
        let weight = (count as f64 * other.count as f64) / self.count as f64;

        self.m2 = (self.m2 - other.m2 - delta * delta * weight).max(0.0);
        self.mean = mean;
        self.count = count;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Running mean; `0.0` with no samples.
    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance (`m2 / n`); `0.0` with no samples.
    #[inline]
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Sample variance (`m2 / (n - 1)`); `0.0` with fewer than two samples.
    #[inline]
    pub fn variance_unbiased(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    #[inline]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    #[inline]
    pub fn std_dev_unbiased(&self) -> f64 {
        self.variance_unbiased().sqrt()
    }

    pub fn snapshot(&self) -> EstimatorSnapshot {
        EstimatorSnapshot {
            count: self.count,
            mean: self.mean,
            variance: self.variance(),
            std_dev: self.std_dev(),
        }
    }
}

impl FromIterator<f64> for OnlineNormalEstimator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut estimator = Self::new();
        iter.into_iter().for_each(|value| estimator.add(value));
        estimator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;

    const EPSILON: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_mean_and_variance() {
        let estimator = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]
            .into_iter()
            .collect::<OnlineNormalEstimator>();

        assert_eq!(estimator.count(), 8);
        assert!(close(estimator.mean(), 5.0));
        assert!(close(estimator.variance(), 4.0));
        assert!(close(estimator.std_dev(), 2.0));
        assert!(close(estimator.variance_unbiased(), 32.0 / 7.0));
    }

    #[test]
    fn test_empty_estimator_reads_zero() {
        let estimator = OnlineNormalEstimator::new();
        assert!(estimator.is_empty());
        assert_eq!(estimator.mean(), 0.0);
        assert_eq!(estimator.variance(), 0.0);
        assert_eq!(estimator.std_dev_unbiased(), 0.0);
    }

    #[test]
    fn test_remove_undoes_add() {
        let mut estimator = [1.0, 2.0, 3.0].into_iter().collect::<OnlineNormalEstimator>();
        estimator.add(100.0);
        estimator.remove(100.0);

        assert_eq!(estimator.count(), 3);
        assert!(close(estimator.mean(), 2.0));
        assert!(close(estimator.variance(), 2.0 / 3.0));

        estimator.remove(1.0);
        estimator.remove(2.0);
        estimator.remove(3.0);
        assert!(estimator.is_empty());
        assert_eq!(estimator.mean(), 0.0);
    }

    #[test]
    fn test_replace_keeps_count() {
        let mut estimator = [1.0, 2.0, 3.0].into_iter().collect::<OnlineNormalEstimator>();
        estimator.replace(3.0, 6.0);

        let expected = [1.0, 2.0, 6.0].into_iter().collect::<OnlineNormalEstimator>();
        assert_eq!(estimator.count(), 3);
        assert!(close(estimator.mean(), expected.mean()));
        assert!(close(estimator.variance(), expected.variance()));
    }

    /// Merging two halves must match feeding every sample into one estimator,
    /// and subtracting one half back out must recover the other.
    #[test]
    fn test_merge_and_subtract_random_halves() {
        let left = (0..50)
            .map(|_| (0..1_000).fake::<i32>() as f64)
            .collect::<Vec<_>>();
        let right = (0..70)
            .map(|_| (-500..500).fake::<i32>() as f64)
            .collect::<Vec<_>>();

        let a = left.iter().copied().collect::<OnlineNormalEstimator>();
        let b = right.iter().copied().collect::<OnlineNormalEstimator>();
        let all = left.iter().chain(&right).copied().collect::<OnlineNormalEstimator>();

        let mut merged = a;
        merged.merge(&b);
        assert_eq!(merged.count(), all.count());
        assert!((merged.mean() - all.mean()).abs() < 1e-6);
        assert!((merged.variance() - all.variance()).abs() < 1e-6);

        merged.subtract(&b);
        assert_eq!(merged.count(), a.count());
        assert!((merged.mean() - a.mean()).abs() < 1e-6);
        assert!((merged.variance() - a.variance()).abs() < 1e-6);
    }

    #[test]
    fn test_subtract_everything_resets() {
        let mut a = [1.0, 2.0].into_iter().collect::<OnlineNormalEstimator>();
        let b = [1.0, 2.0, 3.0].into_iter().collect::<OnlineNormalEstimator>();

        a.subtract(&b);
        assert!(a.is_empty());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let estimator = [1.0, 3.0].into_iter().collect::<OnlineNormalEstimator>();
        let json = serde_json::to_value(estimator.snapshot()).expect("serializable");

        assert_eq!(json["count"], 2);
        assert_eq!(json["mean"], 2.0);
        assert_eq!(json["stdDev"], 1.0);
    }
}

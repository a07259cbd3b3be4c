//! # Histogram Snapshots
//!
//! A [`HistogramSnapshot`] freezes the headline statistics of an
//! [`hdrhistogram::Histogram`] together with a compressed copy of its
//! buckets, so that snapshots taken by different producers can later be merged
//! into a single distribution.
//!
//! ## Blob Format
//! The `blob` field holds the histogram in the HdrHistogram V2 + DEFLATE
//! encoding, base64-encoded so the snapshot stays plain JSON.
use crate::error::{StatsError, StatsResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hdrhistogram::serialization::{Deserializer, Serializer, V2DeflateSerializer};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

/// Significant figures of the accumulator created by [`HistogramAccumulator`].
const ACCUMULATOR_SIGFIG: u8 = 3;

/// A requested percentile and the value found at it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: u64,
}

/// Configuration parameters for [`get_histogram_snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotOptions {
    /// Percentiles to extract, each in `[0, 100]`.
    pub percentiles: SmallVec<[f64; 4]>,
}

impl SnapshotOptions {
    pub fn new<I>(percentiles: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self {
            percentiles: percentiles.into_iter().collect(),
        }
    }

    /// # Errors
    /// Returns [`StatsError::PercentileOutOfRange`] for the first percentile
    /// that is NaN or outside `[0, 100]`.
    pub fn validate(&self) -> StatsResult<()> {
        match self
            .percentiles
            .iter()
            .find(|percentile| !(0.0..=100.0).contains(*percentile))
        {
            Some(&percentile) => Err(StatsError::PercentileOutOfRange(percentile)),
            None => Ok(()),
        }
    }
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            percentiles: smallvec![90.0, 95.0, 99.0, 99.5],
        }
    }
}

/// An immutable summary of a histogram at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramSnapshot {
    pub count: u64,
    pub mean: f64,
    pub median: u64,
    pub std_dev: f64,
    /// `0` when the histogram is empty.
    pub min: u64,
    pub max: u64,
    pub percentiles: SmallVec<[PercentileValue; 4]>,
    /// Base64 of the V2 + DEFLATE encoded histogram.
    pub blob: String,
}

impl HistogramSnapshot {
    /// Rebuilds the histogram this snapshot was taken from.
    ///
    /// # Errors
    /// Fails if the blob is not valid base64 or not a valid encoded histogram.
    pub fn decode(&self) -> StatsResult<Histogram<u64>> {
        let bytes = STANDARD.decode(&self.blob)?;
        let mut reader = bytes.as_slice();

        Ok(Deserializer::new().deserialize(&mut reader)?)
    }

    /// Value recorded at `percentile`, if it was requested when the snapshot
    /// was taken.
    pub fn percentile(&self, percentile: f64) -> Option<u64> {
        self.percentiles
            .iter()
            .find(|entry| entry.percentile == percentile)
            .map(|entry| entry.value)
    }
}

/// Takes a snapshot of `histogram`.
///
/// # Errors
/// Fails if a requested percentile is out of range or the histogram cannot be
/// encoded.
pub fn get_histogram_snapshot(
    histogram: &Histogram<u64>,
    options: &SnapshotOptions,
) -> StatsResult<HistogramSnapshot> {
    options.validate()?;

    let mut encoded = Vec::new();
    V2DeflateSerializer::new().serialize(histogram, &mut encoded)?;

    let percentiles = options
        .percentiles
        .iter()
        .map(|&percentile| PercentileValue {
            percentile,
            value: histogram.value_at_percentile(percentile),
        })
        .collect();

    let empty = histogram.is_empty();

    Ok(HistogramSnapshot {
        count: histogram.len(),
        mean: if empty { 0.0 } else { histogram.mean() },
        median: histogram.value_at_quantile(0.5),
        std_dev: if empty { 0.0 } else { histogram.stdev() },
        min: if empty { 0 } else { histogram.min() },
        max: histogram.max(),
        percentiles,
        blob: STANDARD.encode(encoded),
    })
}

/// Merges snapshot blobs into one histogram, created on the first snapshot
/// that carries data.
#[derive(Debug, Default)]
pub struct HistogramAccumulator {
    histogram: Option<Histogram<u64>>,
    merged: usize,
}

impl HistogramAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `snapshot` and adds it in. Snapshots without samples are skipped.
    ///
    /// # Errors
    /// Fails if the blob cannot be decoded. The accumulator is left unchanged,
    /// so the caller may skip the snapshot and carry on.
    pub fn add(&mut self, snapshot: &HistogramSnapshot) -> StatsResult<()> {
        if snapshot.count == 0 {
            return Ok(());
        }

        let decoded = snapshot.decode()?;
        if self.histogram.is_none() {
            self.histogram = Some(Histogram::new(ACCUMULATOR_SIGFIG)?);
        }
        if let Some(accumulator) = self.histogram.as_mut() {
            accumulator.add(&decoded)?;
        }
        self.merged += 1;

        Ok(())
    }

    /// Number of snapshots merged so far.
    #[inline]
    pub fn merged(&self) -> usize {
        self.merged
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.histogram.is_none()
    }

    /// The merged histogram, or an empty one if nothing carried data.
    pub fn finish(self) -> StatsResult<Histogram<u64>> {
        match self.histogram {
            Some(histogram) => Ok(histogram),
            None => Ok(Histogram::new(ACCUMULATOR_SIGFIG)?),
        }
    }
}

/// Merges every snapshot into one histogram.
///
/// # Errors
/// Stops at the first snapshot that fails to decode.
pub fn aggregate_histograms<'a, I>(snapshots: I) -> StatsResult<Histogram<u64>>
where
    I: IntoIterator<Item = &'a HistogramSnapshot>,
{
    let mut accumulator = HistogramAccumulator::new();
    for snapshot in snapshots {
        accumulator.add(snapshot)?;
    }

    accumulator.finish()
}

/// Merges every snapshot into one histogram, skipping the ones that fail to
/// decode.
///
/// # Errors
/// Fails only if the accumulator itself cannot be created.
pub fn aggregate_histograms_lossy<'a, I>(snapshots: I) -> StatsResult<Histogram<u64>>
where
    I: IntoIterator<Item = &'a HistogramSnapshot>,
{
    let mut accumulator = HistogramAccumulator::new();
    for (position, snapshot) in snapshots.into_iter().enumerate() {
        if let Err(error) = accumulator.add(snapshot) {
            tracing::warn!(position, %error, "skipping undecodable histogram snapshot");
        }
    }

    accumulator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;

    fn histogram_of<I>(values: I) -> Histogram<u64>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut histogram = Histogram::new(3).unwrap();
        for value in values {
            histogram.record(value).unwrap();
        }
        histogram
    }

    fn snapshot_of<I>(values: I) -> HistogramSnapshot
    where
        I: IntoIterator<Item = u64>,
    {
        get_histogram_snapshot(&histogram_of(values), &SnapshotOptions::default()).unwrap()
    }

    /// Verifies that the snapshot maps recorded samples to the expected
    /// headline statistics and default percentiles.
    #[test]
    fn test_snapshot_statistics() {
        let snapshot = snapshot_of(1..=100);

        assert_eq!(snapshot.count, 100);
        assert!((snapshot.mean - 50.5).abs() < 0.1);
        assert!((49..=51).contains(&snapshot.median));
        assert_eq!(snapshot.min, 1);
        assert_eq!(snapshot.max, 100);
        assert!((snapshot.std_dev - 28.866).abs() < 0.1);

        let percentiles: Vec<f64> = snapshot.percentiles.iter().map(|p| p.percentile).collect();
        assert_eq!(percentiles, vec![90.0, 95.0, 99.0, 99.5]);
        assert_eq!(snapshot.percentile(90.0), Some(90));
        assert_eq!(snapshot.percentile(99.0), Some(99));
        assert_eq!(snapshot.percentile(50.0), None);
    }

    /// An empty histogram must not produce NaN or a sentinel minimum.
    #[test]
    fn test_empty_snapshot_safety() {
        let snapshot = snapshot_of(std::iter::empty());

        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.mean, 0.0);
        assert_eq!(snapshot.std_dev, 0.0);
        assert_eq!(snapshot.min, 0);
        assert_eq!(snapshot.max, 0);
        assert!(snapshot.percentiles.iter().all(|p| p.value == 0));
    }

    #[test]
    fn test_custom_percentiles() {
        let options = SnapshotOptions::new([50.0, 99.9]);
        let histogram = histogram_of((1..=10).map(|i| i * 10));
        let snapshot = get_histogram_snapshot(&histogram, &options).unwrap();

        assert_eq!(snapshot.percentiles.len(), 2);
        assert!((49..=51).contains(&snapshot.percentile(50.0).unwrap()));
        assert!((99..=101).contains(&snapshot.percentile(99.9).unwrap()));
    }

    #[test]
    fn test_percentile_range_is_validated() {
        let options = SnapshotOptions::new([50.0, 101.0]);
        assert!(matches!(
            get_histogram_snapshot(&histogram_of([1]), &options),
            Err(StatsError::PercentileOutOfRange(p)) if p == 101.0
        ));
    }

    #[test]
    fn test_blob_decodes_to_source() {
        let values: Vec<u64> = (0..500).map(|_| (1..100_000u64).fake()).collect();
        let source = histogram_of(values.iter().copied());
        let snapshot = get_histogram_snapshot(&source, &SnapshotOptions::default()).unwrap();

        let decoded = snapshot.decode().unwrap();
        assert_eq!(decoded.len(), source.len());
        assert_eq!(decoded.max(), source.max());
        assert_eq!(decoded.value_at_quantile(0.5), source.value_at_quantile(0.5));
    }

    #[test]
    fn test_aggregate_merges_all_samples() {
        let snapshots = [snapshot_of(1..=50), snapshot_of(51..=100)];
        let merged = aggregate_histograms(&snapshots).unwrap();

        assert_eq!(merged.len(), 100);
        assert_eq!(merged.min(), 1);
        assert_eq!(merged.max(), 100);
        assert!((49..=51).contains(&merged.value_at_quantile(0.5)));
    }

    #[test]
    fn test_aggregate_without_data_is_empty() {
        let merged = aggregate_histograms(std::iter::empty()).unwrap();
        assert!(merged.is_empty());

        let snapshots = [snapshot_of(std::iter::empty())];
        let merged = aggregate_histograms(&snapshots).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn test_corrupt_blob_fails_strict_aggregation() {
        let mut corrupt = snapshot_of(1..=10);
        corrupt.blob = "not base64!".to_string();

        let snapshots = [snapshot_of(1..=10), corrupt];
        assert!(matches!(
            aggregate_histograms(&snapshots),
            Err(StatsError::HistogramBlob(_))
        ));
    }

    /// The lossy merge skips the corrupt snapshot and keeps the rest.
    #[test]
    fn test_lossy_aggregation_skips_corrupt_snapshot() {
        let mut truncated = snapshot_of(1..=10);
        truncated.blob = STANDARD.encode([0u8; 8]);

        let snapshots = [snapshot_of(1..=10), truncated, snapshot_of(11..=20)];
        let merged = aggregate_histograms_lossy(&snapshots).unwrap();

        assert_eq!(merged.len(), 20);
    }

    #[test]
    fn test_accumulator_survives_skipped_snapshot() {
        let mut corrupt = snapshot_of([5]);
        corrupt.blob = STANDARD.encode(b"garbage");

        let mut accumulator = HistogramAccumulator::new();
        assert!(accumulator.is_empty());
        assert!(accumulator.add(&corrupt).is_err());
        assert!(accumulator.is_empty());

        accumulator.add(&snapshot_of([5, 6, 7])).unwrap();
        assert_eq!(accumulator.merged(), 1);
        assert_eq!(accumulator.finish().unwrap().len(), 3);
    }

    #[test]
    fn test_snapshot_serialized_shape() {
        let json = serde_json::to_value(snapshot_of([1, 2, 3])).expect("serializable");

        assert_eq!(json["count"], 3);
        assert!(json["stdDev"].is_number());
        assert_eq!(json["percentiles"][0]["percentile"], 90.0);
        assert!(json["blob"].is_string());

        let restored: HistogramSnapshot = serde_json::from_value(json).expect("deserializable");
        assert_eq!(restored.decode().unwrap().len(), 3);
    }
}

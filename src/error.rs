use thiserror::Error;

/// Errors raised by the statistics primitives.
///
/// Every variant except the histogram ones is a construction-time validation
/// failure: once a primitive exists, its hot-path operations are infallible.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("window period must be positive, got {period}ms")]
    InvalidPeriod { period: u64 },

    #[error("time constant must be positive, got {0}")]
    InvalidTimeConstant(f64),

    #[error("tick interval must be positive, got {0}ms")]
    InvalidTickInterval(u64),

    #[error("smoothing factor must be in (0, 1], got {0}")]
    InvalidAlpha(f64),

    #[error("chunk count {count} is out of range [2, {max}]")]
    ChunkCountOutOfRange { count: usize, max: usize },

    #[error("chunk invalidation interval {interval}ms is shorter than the minimum {minimum}ms")]
    InvalidationIntervalTooShort { interval: u64, minimum: u64 },

    #[error("quantile must be a number in [0, 1], got {0}")]
    QuantileOutOfRange(f64),

    #[error("percentile must be a number in [0, 100], got {0}")]
    PercentileOutOfRange(f64),

    #[error("influence must be a number in [0, 1], got {0}")]
    InfluenceOutOfRange(f64),

    #[error("z-score threshold must be a non-negative number, got {0}")]
    InvalidThreshold(f64),

    #[error("rolling window size must be at least 1")]
    ZeroWindowSize,

    #[error("apdex threshold mismatch: {expected}ms != {actual}ms")]
    ThresholdMismatch { expected: u64, actual: u64 },

    #[error("invalid histogram parameters: {0:?}")]
    HistogramCreation(hdrhistogram::CreationError),

    #[error("failed to record value in histogram: {0:?}")]
    HistogramRecord(hdrhistogram::RecordError),

    #[error("failed to merge histograms: {0:?}")]
    HistogramAddition(hdrhistogram::AdditionError),

    #[error("failed to encode histogram: {0:?}")]
    HistogramEncode(hdrhistogram::serialization::V2DeflateSerializeError),

    #[error("failed to decode histogram: {0:?}")]
    HistogramDecode(hdrhistogram::serialization::DeserializeError),

    #[error("histogram blob is not valid base64: {0}")]
    HistogramBlob(#[from] base64::DecodeError),
}

impl From<hdrhistogram::CreationError> for StatsError {
    fn from(e: hdrhistogram::CreationError) -> Self {
        StatsError::HistogramCreation(e)
    }
}

impl From<hdrhistogram::RecordError> for StatsError {
    fn from(e: hdrhistogram::RecordError) -> Self {
        StatsError::HistogramRecord(e)
    }
}

impl From<hdrhistogram::AdditionError> for StatsError {
    fn from(e: hdrhistogram::AdditionError) -> Self {
        StatsError::HistogramAddition(e)
    }
}

impl From<hdrhistogram::serialization::V2DeflateSerializeError> for StatsError {
    fn from(e: hdrhistogram::serialization::V2DeflateSerializeError) -> Self {
        StatsError::HistogramEncode(e)
    }
}

impl From<hdrhistogram::serialization::DeserializeError> for StatsError {
    fn from(e: hdrhistogram::serialization::DeserializeError) -> Self {
        StatsError::HistogramDecode(e)
    }
}

/// Convenience alias for fallible statistics operations.
pub type StatsResult<T> = Result<T, StatsError>;

//! # Exponentially Weighted Moving Averages
//!
//! A tick-driven rate estimator in the style of the classic Unix load
//! average. Events are accumulated with [`Ewma::update`] and folded into the
//! rate once per fixed interval by [`Ewma::tick`]:
//!
//! > alpha = 1 - exp(-interval / time_constant)
//! > rate  = rate + alpha * (instant_rate - rate)
//!
//! The first tick has no history to smooth against and adopts the instant
//! rate directly.
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};

/// Tick interval of the 1/5/15-minute factories, in milliseconds.
pub const DEFAULT_TICK_INTERVAL: u64 = 5_000;

const ONE_MINUTE_SECS: f64 = 60.0;
const FIVE_MINUTES_SECS: f64 = 300.0;
const FIFTEEN_MINUTES_SECS: f64 = 900.0;

/// The unit a rate is expressed in, e.g. events per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl RateUnit {
    /// Length of the unit in seconds.
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        match self {
            Self::Milliseconds => 0.001,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3_600.0,
        }
    }

    /// Length of the unit in milliseconds.
    #[inline]
    pub fn as_millis(self) -> u64 {
        match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
        }
    }
}

/// A decaying event-rate estimate.
#[derive(Debug, Clone)]
pub struct Ewma {
    alpha: f64,
    /// Tick interval in seconds.
    interval: f64,
    uncommitted: f64,
    /// Events per second.
    rate: f64,
    initialized: bool,
}

impl Ewma {
    /// Creates an EWMA with an explicit smoothing factor.
    ///
    /// `interval` is the tick interval in milliseconds.
    ///
    /// # Errors
    /// Returns [`StatsError::InvalidTickInterval`] for a zero interval and
    /// [`StatsError::InvalidAlpha`] unless `alpha` lies in `(0, 1]`.
    pub fn new(alpha: f64, interval: u64) -> StatsResult<Self> {
        if interval == 0 {
            return Err(StatsError::InvalidTickInterval(interval));
        }
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(StatsError::InvalidAlpha(alpha));
        }

        Ok(Self {
            alpha,
            interval: interval as f64 / 1_000.0,
            uncommitted: 0.0,
            rate: 0.0,
            initialized: false,
        })
    }

    /// Creates an EWMA whose smoothing factor decays with `time_constant`
    /// seconds: `alpha = 1 - exp(-interval / time_constant)`.
    ///
    /// # Errors
    /// Returns [`StatsError::InvalidTimeConstant`] unless `time_constant` is a
    /// positive number.
    pub fn with_time_constant(interval: u64, time_constant: f64) -> StatsResult<Self> {
        if time_constant.is_nan() || time_constant <= 0.0 {
            return Err(StatsError::InvalidTimeConstant(time_constant));
        }

        let interval_secs = interval as f64 / 1_000.0;
        Self::new(1.0 - (-interval_secs / time_constant).exp(), interval)
    }

    /// One-minute load-average style EWMA ticking every five seconds.
    pub fn one_minute() -> Self {
        Self::fixed(ONE_MINUTE_SECS)
    }

    /// Five-minute load-average style EWMA ticking every five seconds.
    pub fn five_minute() -> Self {
        Self::fixed(FIVE_MINUTES_SECS)
    }

    /// Fifteen-minute load-average style EWMA ticking every five seconds.
    pub fn fifteen_minute() -> Self {
        Self::fixed(FIFTEEN_MINUTES_SECS)
    }

    fn fixed(time_constant: f64) -> Self {
        let interval = DEFAULT_TICK_INTERVAL as f64 / 1_000.0;
        Self {
            alpha: 1.0 - (-interval / time_constant).exp(),
            interval,
            uncommitted: 0.0,
            rate: 0.0,
            initialized: false,
        }
    }

    /// Accumulates `n` events into the current interval.
    #[inline]
    pub fn update(&mut self, n: f64) {
        self.uncommitted += n;
    }

    /// Folds the current interval into the rate.
    pub fn tick(&mut self) {
        let instant_rate = self.uncommitted / self.interval;
        self.uncommitted = 0.0;

        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    /// Current rate in events per `unit`.
    #[inline]
    pub fn rate(&self, unit: RateUnit) -> f64 {
        self.rate * unit.as_secs_f64()
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.uncommitted = 0.0;
        self.rate = 0.0;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elapse_minute(ewma: &mut Ewma) {
        for _ in 0..12 {
            ewma.tick();
        }
    }

    fn assert_rate(ewma: &Ewma, expected: f64) {
        let rate = ewma.rate(RateUnit::Seconds);
        assert!(
            (rate - expected).abs() < 1e-5,
            "rate {rate} differs from {expected}"
        );
    }

    #[test]
    fn test_non_positive_time_constant_is_rejected() {
        assert!(matches!(
            Ewma::with_time_constant(5_000, 0.0),
            Err(StatsError::InvalidTimeConstant(_))
        ));
        assert!(Ewma::with_time_constant(5_000, -60.0).is_err());
        assert!(Ewma::with_time_constant(5_000, f64::NAN).is_err());
    }

    #[test]
    fn test_alpha_out_of_range_is_rejected() {
        for alpha in [0.0, -0.1, 1.5, f64::NAN] {
            assert!(
                matches!(Ewma::new(alpha, 5_000), Err(StatsError::InvalidAlpha(_))),
                "alpha {alpha} accepted"
            );
        }
        assert!(matches!(
            Ewma::new(0.5, 0),
            Err(StatsError::InvalidTickInterval(0))
        ));
        assert!(Ewma::new(1.0, 5_000).is_ok());
    }

    #[test]
    fn test_factory_alpha_matches_time_constant() {
        let derived = Ewma::with_time_constant(5_000, 60.0).unwrap();
        assert!((Ewma::one_minute().alpha() - derived.alpha()).abs() < 1e-12);
        assert!((Ewma::one_minute().alpha() - 0.07995558537067671).abs() < 1e-12);
    }

    /// Reference decay of a one-minute EWMA after a single burst of 3 events.
    #[test]
    fn test_one_minute_decay() {
        let mut ewma = Ewma::one_minute();
        ewma.update(3.0);
        ewma.tick();
        assert_rate(&ewma, 0.6);

        let expected = [
            0.22072766, 0.08120117, 0.02987224, 0.01098938, 0.00404277, 0.00148725, 0.00054713,
            0.00020128, 0.00007405, 0.00002724, 0.00001002, 0.00000369, 0.00000136, 0.00000050,
            0.00000018,
        ];

        let mut previous = ewma.rate(RateUnit::Seconds);
        for value in expected {
            elapse_minute(&mut ewma);
            assert_rate(&ewma, value);
            assert!(ewma.rate(RateUnit::Seconds) < previous);
            previous = ewma.rate(RateUnit::Seconds);
        }
    }

    #[test]
    fn test_five_minute_decay() {
        let mut ewma = Ewma::five_minute();
        ewma.update(3.0);
        ewma.tick();
        assert_rate(&ewma, 0.6);

        elapse_minute(&mut ewma);
        assert_rate(&ewma, 0.49123845);
        elapse_minute(&mut ewma);
        assert_rate(&ewma, 0.40219203);
    }

    #[test]
    fn test_fifteen_minute_decay() {
        let mut ewma = Ewma::fifteen_minute();
        ewma.update(3.0);
        ewma.tick();
        assert_rate(&ewma, 0.6);

        elapse_minute(&mut ewma);
        assert_rate(&ewma, 0.56130419);
        elapse_minute(&mut ewma);
        assert_rate(&ewma, 0.52510399);
    }

    #[test]
    fn test_rate_units() {
        let mut ewma = Ewma::one_minute();
        ewma.update(10.0);
        ewma.tick();

        assert!((ewma.rate(RateUnit::Seconds) - 2.0).abs() < 1e-12);
        assert!((ewma.rate(RateUnit::Minutes) - 120.0).abs() < 1e-9);
        assert!((ewma.rate(RateUnit::Milliseconds) - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut ewma = Ewma::one_minute();
        ewma.update(5.0);
        ewma.tick();
        ewma.reset();

        ewma.update(10.0);
        ewma.tick();
        assert_rate(&ewma, 2.0);
    }
}

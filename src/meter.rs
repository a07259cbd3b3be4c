//! # Rate Meters
//!
//! A [`Meter`] tracks the rate of a stream of events as a mean rate plus
//! 1-, 5- and 15-minute exponentially weighted rates.
//!
//! ## Lazy Ticking
//! The meter owns no timer. Every mark and every rate read first replays, in
//! order, all whole tick intervals elapsed since the previous access, so the
//! result never depends on how often the meter is polled, only on the clock
//! being monotonic between calls.
use crate::core::clock::Clock;
use crate::core::ticker::TimeTicker;
use crate::error::StatsResult;
use crate::ewma::{DEFAULT_TICK_INTERVAL, Ewma, RateUnit};
use serde::{Deserialize, Serialize};

/// Configuration parameters for a [`Meter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Interval between EWMA ticks, in milliseconds.
    pub tick_interval: u64,
    /// Unit every reported rate is expressed in.
    pub rate_unit: RateUnit,
}

impl MeterConfig {
    pub fn new(tick_interval: u64, rate_unit: RateUnit) -> Self {
        Self {
            tick_interval,
            rate_unit,
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            rate_unit: RateUnit::Seconds,
        }
    }
}

/// The three moving-average rates of a [`MeterSnapshot`], keyed by minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeterRates {
    #[serde(rename = "1")]
    pub one_minute: f64,
    #[serde(rename = "5")]
    pub five_minute: f64,
    #[serde(rename = "15")]
    pub fifteen_minute: f64,
}

/// Serialized form of a meter: `{count, meanRate, rates: {1, 5, 15}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSnapshot {
    pub count: u64,
    pub mean_rate: f64,
    pub rates: MeterRates,
}

/// Event rate tracker with 1/5/15-minute moving averages.
#[derive(Debug)]
pub struct Meter<C>
where
    C: Clock,
{
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    count: u64,
    start_time: u64,
    rate_unit: RateUnit,
    ticker: TimeTicker<C>,
}

impl<C> Meter<C>
where
    C: Clock,
{
    /// Creates a meter ticking every five seconds and reporting per second.
    pub fn new(clock: C) -> Self {
        let start_time = clock.now();

        Self {
            m1: Ewma::one_minute(),
            m5: Ewma::five_minute(),
            m15: Ewma::fifteen_minute(),
            count: 0,
            start_time,
            rate_unit: RateUnit::Seconds,
            ticker: TimeTicker::with_interval(DEFAULT_TICK_INTERVAL, clock),
        }
    }

    /// Creates a meter with a custom tick interval and rate unit.
    ///
    /// # Errors
    /// Fails if the tick interval is zero.
    pub fn with_config(config: MeterConfig, clock: C) -> StatsResult<Self> {
        let minutes = |m: f64| Ewma::with_time_constant(config.tick_interval, m * 60.0);
        let start_time = clock.now();

        Ok(Self {
            m1: minutes(1.0)?,
            m5: minutes(5.0)?,
            m15: minutes(15.0)?,
            count: 0,
            start_time,
            rate_unit: config.rate_unit,
            ticker: TimeTicker::new(config.tick_interval, clock)?,
        })
    }

    /// Records a single event.
    #[inline]
    pub fn mark(&mut self) {
        self.mark_n(1);
    }

    /// Records `n` events.
    pub fn mark_n(&mut self, n: u64) {
        self.tick_if_needed();

        self.count += n;
        self.m1.update(n as f64);
        self.m5.update(n as f64);
        self.m15.update(n as f64);
    }

    /// Total events recorded.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn one_minute_rate(&mut self) -> f64 {
        self.tick_if_needed();
        self.m1.rate(self.rate_unit)
    }

    pub fn five_minute_rate(&mut self) -> f64 {
        self.tick_if_needed();
        self.m5.rate(self.rate_unit)
    }

    pub fn fifteen_minute_rate(&mut self) -> f64 {
        self.tick_if_needed();
        self.m15.rate(self.rate_unit)
    }

    /// Average rate since creation or the last reset.
    ///
    /// Infinite when no time has elapsed yet.
    pub fn mean_rate(&self) -> f64 {
        let elapsed = self.ticker.clock().now().saturating_sub(self.start_time);
        if elapsed == 0 {
            return f64::INFINITY;
        }

        let elapsed_units = elapsed as f64 / self.rate_unit.as_millis() as f64;
        self.count as f64 / elapsed_units
    }

    pub fn snapshot(&mut self) -> MeterSnapshot {
        self.tick_if_needed();

        MeterSnapshot {
            count: self.count,
            mean_rate: self.mean_rate(),
            rates: MeterRates {
                one_minute: self.m1.rate(self.rate_unit),
                five_minute: self.m5.rate(self.rate_unit),
                fifteen_minute: self.m15.rate(self.rate_unit),
            },
        }
    }

    /// Forgets every event and restarts the mean-rate clock.
    pub fn reset(&mut self) {
        self.m1.reset();
        self.m5.reset();
        self.m15.reset();
        self.count = 0;
        self.start_time = self.ticker.clock().now();
        self.ticker.reset();
    }

    fn tick_if_needed(&mut self) {
        let (m1, m5, m15) = (&mut self.m1, &mut self.m5, &mut self.m15);

        let ticks = self.ticker.tick_if_needed_with(|| {
            m1.tick();
            m5.tick();
            m15.tick();
        });

        if ticks > 0 {
            tracing::trace!(ticks, "meter replayed elapsed ticks");
        }
    }
}

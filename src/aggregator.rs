//! Windowed min/max/latest aggregates.
//!
//! Each aggregator keeps one raw value per time slice in a
//! [`SlidingTimeWindow`] and answers with the aggregate over every live slice.
//! The window-wide value is recomputed by scanning the slices after each
//! update: evicting the oldest slice can change the extremum even when the
//! incoming value did not.
use crate::core::clock::Clock;
use crate::core::window::{DefaultValue, SlidingTimeWindow, TimeWindow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The combining rule of a windowed aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Min,
    Max,
    Latest,
}

impl AggregateKind {
    /// Folds `value` into an accumulated aggregate.
    #[inline]
    pub fn combine(self, acc: Option<f64>, value: f64) -> f64 {
        match (self, acc) {
            (_, None) | (Self::Latest, Some(_)) => value,
            (Self::Min, Some(acc)) => acc.min(value),
            (Self::Max, Some(acc)) => acc.max(value),
        }
    }

    /// Human-readable label for an aggregated metric.
    ///
    /// The short form is `min(Name)`/`max(Name)`; the long form is
    /// `Name min`/`Name max`. `Latest` has no functional short form and
    /// yields the bare metric name, or `Name latest value` in long form.
    pub fn description(self, metric: &str, short: bool) -> String {
        match (self, short) {
            (Self::Min, true) => format!("min({metric})"),
            (Self::Max, true) => format!("max({metric})"),
            (Self::Latest, true) => metric.to_string(),
            (Self::Min, false) => format!("{metric} min"),
            (Self::Max, false) => format!("{metric} max"),
            (Self::Latest, false) => format!("{metric} latest value"),
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no [`AggregateKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown aggregate '{0}'")]
pub struct UnknownAggregate(pub String);

impl FromStr for AggregateKind {
    type Err = UnknownAggregate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" | "minimum" => Ok(Self::Min),
            "max" | "maximum" => Ok(Self::Max),
            "latest" | "last" => Ok(Self::Latest),
            _ => Err(UnknownAggregate(s.to_string())),
        }
    }
}

/// A min, max or latest aggregate over a sliding time window.
#[derive(Debug)]
pub struct WindowedAggregator<C>
where
    C: Clock,
{
    kind: AggregateKind,
    window: SlidingTimeWindow<Option<f64>, C>,
    count: u64,
    value: Option<f64>,
    default: Option<f64>,
}

impl<C> WindowedAggregator<C>
where
    C: Clock,
{
    pub fn new(kind: AggregateKind, window: TimeWindow, clock: C) -> Self {
        Self {
            kind,
            window: SlidingTimeWindow::new(window, DefaultValue::Constant(None), clock),
            count: 0,
            value: None,
            default: None,
        }
    }

    #[inline]
    pub fn min(window: TimeWindow, clock: C) -> Self {
        Self::new(AggregateKind::Min, window, clock)
    }

    #[inline]
    pub fn max(window: TimeWindow, clock: C) -> Self {
        Self::new(AggregateKind::Max, window, clock)
    }

    #[inline]
    pub fn latest(window: TimeWindow, clock: C) -> Self {
        Self::new(AggregateKind::Latest, window, clock)
    }

    /// Sets the value reported while the window holds no samples.
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    /// Records `value` at `timestamp` (or at the clock's reading) and returns
    /// the updated aggregate.
    pub fn update(&mut self, value: f64, timestamp: Option<u64>) -> Option<f64> {
        let now = timestamp.unwrap_or_else(|| self.window.clock().now());
        let kind = self.kind;

        let slice = self.window.current_at(now);
        *slice = Some(kind.combine(*slice, value));
        self.count += 1;

        self.recompute();
        self.value.or(self.default)
    }

    /// Current aggregate over the live window, or the configured default.
    pub fn value(&mut self) -> Option<f64> {
        if self.window.rotate() > 0 {
            self.recompute();
        }

        self.value.or(self.default)
    }

    /// Number of updates since construction or the last reset.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    #[inline]
    pub fn description(&self, metric: &str, short: bool) -> String {
        self.kind.description(metric, short)
    }

    pub fn reset(&mut self) {
        self.window.reset();
        self.count = 0;
        self.value = None;
    }

    fn recompute(&mut self) {
        let kind = self.kind;
        self.value = self
            .window
            .materialized()
            .filter_map(|slice| *slice)
            .fold(None, |acc, value| Some(kind.combine(acc, value)));
    }
}

/// Caller-owned cache of aggregate lookups.
///
/// Resolves aggregate names to [`AggregateKind`]s and memoizes rendered
/// metric descriptions. Each engine instance owns its own catalog, so
/// independent instances never share lookup state.
#[derive(Debug, Default)]
pub struct AggregatorCatalog {
    kinds: HashMap<String, Option<AggregateKind>>,
    descriptions: HashMap<(AggregateKind, String, bool), String>,
}

impl AggregatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `name` to an aggregate kind, caching the outcome (including
    /// misses).
    pub fn kind(&mut self, name: &str) -> Option<AggregateKind> {
        if let Some(kind) = self.kinds.get(name) {
            return *kind;
        }

        let kind = name.parse::<AggregateKind>().ok();
        self.kinds.insert(name.to_string(), kind);
        kind
    }

    /// Memoized [`AggregateKind::description`].
    pub fn description(&mut self, kind: AggregateKind, metric: &str, short: bool) -> &str {
        self.descriptions
            .entry((kind, metric.to_string(), short))
            .or_insert_with(|| kind.description(metric, short))
    }

    /// Builds an aggregator for the named kind.
    pub fn build<C>(&mut self, name: &str, window: TimeWindow, clock: C) -> Option<WindowedAggregator<C>>
    where
        C: Clock,
    {
        self.kind(name)
            .map(|kind| WindowedAggregator::new(kind, window, clock))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
        self.descriptions.clear();
    }
}

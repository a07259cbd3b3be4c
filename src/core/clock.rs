use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Release};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time in milliseconds.
///
/// Every time-dependent primitive in this crate reads "now" exclusively
/// through a `Clock`, which makes each algorithm a deterministic function of
/// its prior state and the clock reading. Tests drive time with a
/// [`ManualClock`]; production code uses [`SystemClock`].
pub trait Clock {
    /// Returns the current time in milliseconds.
    fn now(&self) -> u64;
}

impl<C> Clock for &C
where
    C: Clock + ?Sized,
{
    #[inline]
    fn now(&self) -> u64 {
        (**self).now()
    }
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    #[inline]
    fn now(&self) -> u64 {
        self.as_ref().now()
    }
}

/// Wall-clock time as milliseconds since the UNIX epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// The reading lives in an atomic so a single `Arc<ManualClock>` can be handed
/// to several components and advanced from the outside while they hold it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock reading `now` milliseconds.
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Sets the reading. Moving backwards is allowed; consumers absorb a
    /// regression as zero elapsed time.
    #[inline]
    pub fn set(&self, now: u64) {
        self.now.store(now, Release);
    }

    /// Moves the reading forward by `millis` and returns the new reading.
    #[inline]
    pub fn advance_by(&self, millis: u64) -> u64 {
        self.now.fetch_add(millis, AcqRel) + millis
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> u64 {
        self.now.load(Acquire)
    }
}

//! Wall-clock stamps in ROS `{secs, nsecs}` form.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u32 = 1_000_000_000;

// ── Stamp ────────────────────────────────────────────────────────

/// Seconds since the Unix epoch plus a nanosecond remainder.
///
/// `nsecs` is always in `0..=999_999_999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Stamp {
    pub secs: u64,
    pub nsecs: u32,
}

impl Stamp {
    /// Build a stamp, carrying any excess nanoseconds into `secs`.
    pub fn new(secs: u64, nsecs: u32) -> Self {
        Self {
            secs: secs + u64::from(nsecs / NANOS_PER_SEC),
            nsecs: nsecs % NANOS_PER_SEC,
        }
    }

    /// Decompose a millisecond epoch value.
    pub fn from_unix_millis(millis: u64) -> Self {
        Self {
            secs: millis / 1000,
            nsecs: (millis % 1000) as u32 * 1_000_000,
        }
    }

    /// Decompose a duration measured from the Unix epoch.
    pub fn from_duration(since_epoch: Duration) -> Self {
        Self {
            secs: since_epoch.as_secs(),
            nsecs: since_epoch.subsec_nanos(),
        }
    }

    /// The current wall-clock time.
    ///
    /// A clock set before 1970 yields the zero stamp.
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Self::from_duration)
            .unwrap_or_default()
    }

    /// Back to a duration since the epoch.
    pub fn as_duration(&self) -> Duration {
        Duration::new(self.secs, self.nsecs)
    }
}

// ── Clock ────────────────────────────────────────────────────────

/// Source of publish stamps. Injected so tests can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Stamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Stamp {
        Stamp::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Stamp);

impl Clock for FixedClock {
    fn now(&self) -> Stamp {
        self.0
    }
}

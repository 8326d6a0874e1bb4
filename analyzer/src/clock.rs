//! Wall-clock sources and the history timestamp type
//!
//! Updatable metrics stamp every recorded value with the local wall-clock
//! time. The clock is injected so that staleness can be tested by moving a
//! [`ManualClock`] instead of sleeping.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Rendering used for history keys, e.g. `2025-04-06T12:34:56.789012`.
///
/// Fixed width, so lexicographic order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Accepts any fractional precision (or none) when reading timestamps back.
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Source of "now" for history timestamps and staleness checks
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

/// The process wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle while the
/// metric under test holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a clock frozen at the current wall-clock time
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now())
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.update(|now| now + by);
    }

    /// Move the clock backward (simulates an NTP step or manual adjustment)
    pub fn rewind(&self, by: Duration) {
        self.update(|now| now - by);
    }

    /// Jump to an absolute instant
    pub fn set(&self, at: NaiveDateTime) {
        self.update(|_| at);
    }

    fn update(&self, f: impl FnOnce(NaiveDateTime) -> NaiveDateTime) {
        let mut guard = match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = f(*guard);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Shared clock handle held by updatable metrics
pub type SharedClock = Arc<dyn Clock>;

/// Instant at which a history entry was recorded.
///
/// Displays and serializes as an ISO-8601 string with microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Whole days elapsed between this timestamp and `now` (negative if in the future)
    pub fn days_before(&self, now: NaiveDateTime) -> i64 {
        (now - self.0).num_days()
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_PARSE_FORMAT).map(Self)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

//! Aging Timestamps
//!
//! Record timestamps count whole hours since 1601-01-01T00:00Z. The value 0
//! is reserved: a record stamped 0 is static and never ages. Tombstones also
//! carry a fine-grained instant in 100ns ticks since the same epoch (NTTIME).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds between 1601-01-01 and the Unix epoch
const EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Hour timestamp of the Unix epoch
pub const UNIX_EPOCH_HOURS: u32 = 3_234_576;

/// NTTIME of the Unix epoch
pub const UNIX_EPOCH_NTTIME: u64 = 116_444_736_000_000_000;

/// 100ns ticks per hour
pub const NTTIME_TICKS_PER_HOUR: u64 = 36_000_000_000;

const NTTIME_TICKS_PER_SEC: i64 = 10_000_000;

/// Age timestamp of a record, in hours since 1601
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DnsTimestamp(u32);

impl DnsTimestamp {
    /// The static sentinel
    pub const STATIC: DnsTimestamp = DnsTimestamp(0);

    pub const fn from_hours(hours: u32) -> Self {
        Self(hours)
    }

    pub const fn hours(self) -> u32 {
        self.0
    }

    /// Whether this timestamp marks a record as exempt from aging
    pub const fn is_static(self) -> bool {
        self.0 == 0
    }

    /// Hour timestamp for a wall-clock instant, clamped to the u32 range
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let hours = (at.timestamp() + EPOCH_OFFSET_SECS).div_euclid(3600);
        Self(hours.clamp(0, u32::MAX as i64) as u32)
    }

    /// Wall-clock start of this hour. `None` for the static sentinel.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if self.is_static() {
            return None;
        }
        let secs = self.0 as i64 * 3600 - EPOCH_OFFSET_SECS;
        DateTime::<Utc>::from_timestamp(secs, 0)
    }

    /// Hours elapsed between this timestamp and `now`.
    ///
    /// A timestamp in the future of `now` has age 0.
    pub fn age_at(self, now: DnsTimestamp) -> u32 {
        now.0.saturating_sub(self.0)
    }

    /// The timestamp `hours` earlier. Never wraps below hour 1, so rewinding
    /// a live timestamp cannot accidentally make it static.
    pub fn rewound(self, hours: u32) -> Self {
        if self.is_static() {
            return self;
        }
        Self(self.0.saturating_sub(hours).max(1))
    }

    /// The timestamp `hours` later
    pub fn advanced(self, hours: u32) -> Self {
        Self(self.0.saturating_add(hours))
    }
}

impl fmt::Display for DnsTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            write!(f, "static")
        } else {
            write!(f, "{}h", self.0)
        }
    }
}

/// Fine-grained instant in 100ns ticks since 1601 (NTTIME)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NtTime(u64);

impl NtTime {
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// The instant at the start of an hour timestamp
    pub const fn from_hours(hours: DnsTimestamp) -> Self {
        Self(hours.hours() as u64 * NTTIME_TICKS_PER_HOUR)
    }

    /// The hour containing this instant, clamped to the u32 range
    pub fn to_hours(self) -> DnsTimestamp {
        let hours = self.0 / NTTIME_TICKS_PER_HOUR;
        DnsTimestamp::from_hours(hours.min(u32::MAX as u64) as u32)
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let secs = at.timestamp() + EPOCH_OFFSET_SECS;
        if secs < 0 {
            return Self(0);
        }
        let ticks = secs as i128 * NTTIME_TICKS_PER_SEC as i128
            + (at.timestamp_subsec_nanos() / 100) as i128;
        Self(ticks.min(u64::MAX as i128) as u64)
    }

    /// Ticks elapsed since this instant, or `None` if it lies after `now`
    pub fn elapsed_at(self, now: NtTime) -> Option<u64> {
        now.0.checked_sub(self.0)
    }
}

impl fmt::Display for NtTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One clock reading, taken once per logical operation.
///
/// Both fields normally describe the same instant; tests build them
/// independently to observe skew between the hour and tick clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingInstant {
    pub hours: DnsTimestamp,
    pub nttime: NtTime,
}

impl AgingInstant {
    /// Read the system clock
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            hours: DnsTimestamp::from_datetime(at),
            nttime: NtTime::from_datetime(at),
        }
    }

    /// The instant at the start of the given hour
    pub fn at_hour(hours: u32) -> Self {
        let hours = DnsTimestamp::from_hours(hours);
        Self {
            hours,
            nttime: NtTime::from_hours(hours),
        }
    }

    /// The same instant moved forward by whole hours on both clocks
    pub fn plus_hours(self, hours: u32) -> Self {
        Self {
            hours: self.hours.advanced(hours),
            nttime: NtTime::from_ticks(
                self.nttime
                    .ticks()
                    .saturating_add(hours as u64 * NTTIME_TICKS_PER_HOUR),
            ),
        }
    }
}

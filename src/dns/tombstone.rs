//! Tombstone Transitions
//!
//! A tombstoned node holds exactly one TOMBSTONE record. Its `timestamp`
//! carries the entombment hour and its data the entombment instant in NTTIME
//! ticks. Expiry decisions use the tick value.

use serde::{Deserialize, Serialize};

use super::{DnsNode, DnsRecord, DnsTimestamp, NtTime, NTTIME_TICKS_PER_HOUR};

/// Tombstone status of a node, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TombstoneState {
    /// The node holds live records
    Live { record_count: usize },
    /// The node is a tombstone awaiting extinction
    Tombstoned {
        timestamp: DnsTimestamp,
        entombed_at: NtTime,
    },
}

impl TombstoneState {
    pub fn is_tombstoned(&self) -> bool {
        matches!(self, TombstoneState::Tombstoned { .. })
    }
}

/// Replace every record of `node` with a single tombstone.
///
/// `hours` and `entombed` normally describe the same instant; they are taken
/// separately so skew between the two clocks can be reproduced.
pub fn tombstone(node: &mut DnsNode, hours: DnsTimestamp, entombed: NtTime) {
    node.records = vec![DnsRecord::tombstone(hours, entombed)];
    node.tombstoned = true;
}

/// Drop the tombstone so the node can be rebuilt from scratch.
///
/// Returns whether the node was tombstoned.
pub fn untombstone(node: &mut DnsNode) -> bool {
    if !node.tombstoned {
        return false;
    }
    node.records.clear();
    node.tombstoned = false;
    true
}

/// Report the tombstone status of a node
pub fn tombstone_state(node: &DnsNode) -> TombstoneState {
    if !node.tombstoned {
        return TombstoneState::Live {
            record_count: node.records.len(),
        };
    }

    let timestamp = node.tombstone_timestamp().unwrap_or(DnsTimestamp::STATIC);
    TombstoneState::Tombstoned {
        timestamp,
        entombed_at: entombed_instant(node).unwrap_or_else(|| NtTime::from_hours(timestamp)),
    }
}

/// Entombment instant used for expiry. Falls back to the hour timestamp when
/// the tombstone data is not an 8-byte instant.
fn entombed_instant(node: &DnsNode) -> Option<NtTime> {
    node.entombed_time()
        .or_else(|| node.tombstone_timestamp().map(NtTime::from_hours))
}

/// Whether a tombstoned node has outlived `lifetime_hours` at `now`.
///
/// A tombstone entombed in the future of `now` is never extinct.
pub fn is_extinct(node: &DnsNode, lifetime_hours: u32, now: NtTime) -> bool {
    if !node.tombstoned {
        return false;
    }
    let Some(entombed) = entombed_instant(node) else {
        return false;
    };
    match entombed.elapsed_at(now) {
        Some(elapsed) => elapsed > lifetime_hours as u64 * NTTIME_TICKS_PER_HOUR,
        None => false,
    }
}

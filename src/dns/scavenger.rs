//! Scavenging Sweep Planning
//!
//! Decides, node by node, whether a sweep keeps, tombstones or deletes it.
//! The decision is pure; the engine applies each one as its own node
//! transaction and collects the results into a [`SweepReport`].

use serde::{Deserialize, Serialize};

use super::tombstone;
use super::{AgingInstant, DnsNode, NodeKey, ZoneAgingConfig};

/// What a sweep does with one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepAction {
    Keep,
    Tombstone,
    Delete,
}

/// Plan the sweep action for a single node.
///
/// A live node is tombstoned when aging is on for its zone, it holds no
/// static record and every record is older than `no_refresh + refresh`
/// hours. A node with no records at all qualifies. A tombstoned node is
/// deleted once it has been entombed longer than `tombstone_lifetime_hours`.
pub fn plan_node(
    node: &DnsNode,
    config: &ZoneAgingConfig,
    tombstone_lifetime_hours: u32,
    now: AgingInstant,
) -> SweepAction {
    if node.tombstoned {
        return if tombstone::is_extinct(node, tombstone_lifetime_hours, now.nttime) {
            SweepAction::Delete
        } else {
            SweepAction::Keep
        };
    }

    if !config.enabled || node.has_static_record() {
        return SweepAction::Keep;
    }

    let threshold = config.scavenge_after_hours();
    let all_stale = node
        .records
        .iter()
        .all(|record| record.timestamp.age_at(now.hours) as u64 > threshold);

    if all_stale {
        SweepAction::Tombstone
    } else {
        SweepAction::Keep
    }
}

/// A node the sweep could not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedNode {
    pub key: NodeKey,
    pub reason: String,
}

/// Result of sweeping one zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub zone: String,
    /// Nodes examined
    pub examined: usize,
    /// Live nodes turned into tombstones
    pub tombstoned: Vec<NodeKey>,
    /// Tombstoned nodes removed
    pub deleted: Vec<NodeKey>,
    /// Nodes left untouched after an error
    pub skipped: Vec<SkippedNode>,
}

impl SweepReport {
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            ..Default::default()
        }
    }

    /// Whether the sweep changed nothing and hit no errors
    pub fn is_empty(&self) -> bool {
        self.tombstoned.is_empty() && self.deleted.is_empty() && self.skipped.is_empty()
    }

    pub fn record(&mut self, key: NodeKey, action: SweepAction) {
        match action {
            SweepAction::Keep => {}
            SweepAction::Tombstone => self.tombstoned.push(key),
            SweepAction::Delete => self.deleted.push(key),
        }
    }

    pub fn skip(&mut self, key: NodeKey, reason: impl Into<String>) {
        self.skipped.push(SkippedNode {
            key,
            reason: reason.into(),
        });
    }
}

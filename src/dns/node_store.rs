//! Node Storage
//!
//! Storage seam of the aging engine. Every node carries a store-wide,
//! monotonically increasing version; writes and deletes are compare-and-swap
//! on that version so concurrent writers to the same node cannot lose each
//! other's changes. A version is never reused, so a node deleted and
//! recreated between a read and a write still fails the check.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AgingError, DnsNode, NodeKey};

/// A node together with the version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedNode {
    pub node: DnsNode,
    pub version: u64,
}

/// Persistent node storage with per-node optimistic concurrency
#[async_trait::async_trait]
pub trait NodeStore: Send + Sync {
    /// Read a node and its current version
    async fn read_node(&self, key: &NodeKey) -> Result<Option<VersionedNode>, AgingError>;

    /// Write a node if its stored version still equals `expected`.
    ///
    /// `expected = None` requires that the node does not exist yet. Returns
    /// the new version, or `ConcurrentModification` if the check fails.
    async fn write_node(&self, node: &DnsNode, expected: Option<u64>) -> Result<u64, AgingError>;

    /// Delete a node if its stored version still equals `expected`
    async fn delete_node(&self, key: &NodeKey, expected: u64) -> Result<(), AgingError>;

    /// Keys of every node in a zone, sorted
    async fn list_nodes(&self, zone: &str) -> Result<Vec<NodeKey>, AgingError>;
}

pub(crate) fn conflict(key: &NodeKey, expected: Option<u64>, found: Option<u64>) -> AgingError {
    AgingError::ConcurrentModification(format!(
        "{} changed (expected version {:?}, found {:?})",
        key, expected, found
    ))
}

/// In-memory node store
pub struct MemoryNodeStore {
    /// Map of node key -> (node, version)
    nodes: Arc<RwLock<HashMap<NodeKey, VersionedNode>>>,
    next_version: AtomicU64,
}

impl MemoryNodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            next_version: AtomicU64::new(1),
        }
    }

    /// Number of stored nodes
    pub async fn node_count(&self) -> usize {
        let nodes = self.nodes.read().await;
        nodes.len()
    }
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NodeStore for MemoryNodeStore {
    async fn read_node(&self, key: &NodeKey) -> Result<Option<VersionedNode>, AgingError> {
        let nodes = self.nodes.read().await;
        Ok(nodes.get(key).cloned())
    }

    async fn write_node(&self, node: &DnsNode, expected: Option<u64>) -> Result<u64, AgingError> {
        let mut nodes = self.nodes.write().await;

        let found = nodes.get(&node.key).map(|n| n.version);
        if found != expected {
            return Err(conflict(&node.key, expected, found));
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        nodes.insert(
            node.key.clone(),
            VersionedNode {
                node: node.clone(),
                version,
            },
        );
        Ok(version)
    }

    async fn delete_node(&self, key: &NodeKey, expected: u64) -> Result<(), AgingError> {
        let mut nodes = self.nodes.write().await;

        let found = nodes.get(key).map(|n| n.version);
        if found != Some(expected) {
            return Err(conflict(key, Some(expected), found));
        }

        nodes.remove(key);
        Ok(())
    }

    async fn list_nodes(&self, zone: &str) -> Result<Vec<NodeKey>, AgingError> {
        let zone = super::normalize_domain(zone);
        let nodes = self.nodes.read().await;
        let mut keys: Vec<NodeKey> = nodes.keys().filter(|k| k.zone == zone).cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

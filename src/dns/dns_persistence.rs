//! DNS Node Persistence
//!
//! SQLite-backed [`NodeStore`]. Each node is a row carrying its tombstone
//! flag and version; its records are stored in order as blobs in the
//! persisted record layout. Versions come from a single counter row so they
//! are unique across the whole database, including deleted nodes.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::node_store::{conflict, NodeStore, VersionedNode};
use super::record_codec::{decode_record, encode_record};
use super::{AgingError, DnsNode, NodeKey};

/// SQLite persistence for DNS nodes
pub struct SqliteNodeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNodeStore {
    /// Open (or create) the database at `db_path`
    pub fn new(db_path: &str) -> Result<Self, AgingError> {
        let conn = Connection::open(db_path)
            .map_err(|e| AgingError::StorageError(format!("Failed to open database: {}", e)))?;

        Self::create_tables(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self, AgingError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AgingError::StorageError(format!("Failed to open in-memory database: {}", e))
        })?;

        Self::create_tables(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn create_tables(conn: &Connection) -> Result<(), AgingError> {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(|e| AgingError::StorageError(format!("Failed to enable foreign keys: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                zone TEXT NOT NULL,
                name TEXT NOT NULL,
                tombstoned INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL,
                PRIMARY KEY (zone, name)
            )",
            [],
        )
        .map_err(|e| AgingError::StorageError(format!("Failed to create nodes table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                zone TEXT NOT NULL,
                name TEXT NOT NULL,
                position INTEGER NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (zone, name, position),
                FOREIGN KEY (zone, name) REFERENCES nodes(zone, name) ON DELETE CASCADE
            )",
            [],
        )
        .map_err(|e| AgingError::StorageError(format!("Failed to create records table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS node_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                value INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| {
            AgingError::StorageError(format!("Failed to create node_version table: {}", e))
        })?;

        conn.execute(
            "INSERT OR IGNORE INTO node_version (id, value) VALUES (1, 0)",
            [],
        )
        .map_err(|e| AgingError::StorageError(format!("Failed to seed node version: {}", e)))?;

        Ok(())
    }

    /// Number of stored nodes
    pub async fn node_count(&self) -> Result<usize, AgingError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .map_err(|e| AgingError::StorageError(format!("Failed to count nodes: {}", e)))?;
        Ok(count as usize)
    }

    fn stored_version(conn: &Connection, key: &NodeKey) -> Result<Option<u64>, AgingError> {
        conn.query_row(
            "SELECT version FROM nodes WHERE zone = ?1 AND name = ?2",
            params![key.zone, key.name],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|v| v.map(|v| v as u64))
        .map_err(|e| AgingError::StorageError(format!("Failed to read node version: {}", e)))
    }

    fn next_version(tx: &Transaction<'_>) -> Result<u64, AgingError> {
        tx.execute("UPDATE node_version SET value = value + 1 WHERE id = 1", [])
            .map_err(|e| AgingError::StorageError(format!("Failed to bump node version: {}", e)))?;
        let value: i64 = tx
            .query_row("SELECT value FROM node_version WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map_err(|e| AgingError::StorageError(format!("Failed to read node version: {}", e)))?;
        Ok(value as u64)
    }

    fn load_records(conn: &Connection, key: &NodeKey) -> Result<Vec<Vec<u8>>, AgingError> {
        let mut stmt = conn
            .prepare(
                "SELECT data FROM records WHERE zone = ?1 AND name = ?2 ORDER BY position",
            )
            .map_err(|e| AgingError::StorageError(format!("Failed to prepare query: {}", e)))?;

        let blobs = stmt
            .query_map(params![key.zone, key.name], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|e| AgingError::StorageError(format!("Failed to query records: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AgingError::StorageError(format!("Failed to read record: {}", e)))?;

        Ok(blobs)
    }
}

#[async_trait::async_trait]
impl NodeStore for SqliteNodeStore {
    async fn read_node(&self, key: &NodeKey) -> Result<Option<VersionedNode>, AgingError> {
        let conn = self.conn.lock().await;

        let row = conn
            .query_row(
                "SELECT tombstoned, version FROM nodes WHERE zone = ?1 AND name = ?2",
                params![key.zone, key.name],
                |row| Ok((row.get::<_, i32>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(|e| AgingError::StorageError(format!("Failed to load node: {}", e)))?;

        let Some((tombstoned, version)) = row else {
            return Ok(None);
        };

        let records = Self::load_records(&conn, key)?
            .iter()
            .map(|blob| decode_record(blob))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(VersionedNode {
            node: DnsNode {
                key: key.clone(),
                records,
                tombstoned: tombstoned != 0,
            },
            version: version as u64,
        }))
    }

    async fn write_node(&self, node: &DnsNode, expected: Option<u64>) -> Result<u64, AgingError> {
        // Encode before taking the lock so a bad record never opens a transaction
        let blobs = node
            .records
            .iter()
            .map(encode_record)
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| AgingError::StorageError(format!("Failed to begin transaction: {}", e)))?;

        let found = Self::stored_version(&tx, &node.key)?;
        if found != expected {
            return Err(conflict(&node.key, expected, found));
        }

        let version = Self::next_version(&tx)?;

        tx.execute(
            "INSERT INTO nodes (zone, name, tombstoned, version)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(zone, name) DO UPDATE SET
                tombstoned = excluded.tombstoned,
                version = excluded.version",
            params![
                node.key.zone,
                node.key.name,
                node.tombstoned as i32,
                version as i64
            ],
        )
        .map_err(|e| AgingError::StorageError(format!("Failed to save node: {}", e)))?;

        tx.execute(
            "DELETE FROM records WHERE zone = ?1 AND name = ?2",
            params![node.key.zone, node.key.name],
        )
        .map_err(|e| AgingError::StorageError(format!("Failed to clear records: {}", e)))?;

        for (position, blob) in blobs.iter().enumerate() {
            tx.execute(
                "INSERT INTO records (zone, name, position, data) VALUES (?1, ?2, ?3, ?4)",
                params![node.key.zone, node.key.name, position as i64, blob],
            )
            .map_err(|e| AgingError::StorageError(format!("Failed to save record: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AgingError::StorageError(format!("Failed to commit node: {}", e)))?;

        debug!(node = %node.key, version, records = blobs.len(), "persisted node");
        Ok(version)
    }

    async fn delete_node(&self, key: &NodeKey, expected: u64) -> Result<(), AgingError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| AgingError::StorageError(format!("Failed to begin transaction: {}", e)))?;

        let found = Self::stored_version(&tx, key)?;
        if found != Some(expected) {
            return Err(conflict(key, Some(expected), found));
        }

        tx.execute(
            "DELETE FROM nodes WHERE zone = ?1 AND name = ?2",
            params![key.zone, key.name],
        )
        .map_err(|e| AgingError::StorageError(format!("Failed to delete node: {}", e)))?;

        tx.commit()
            .map_err(|e| AgingError::StorageError(format!("Failed to commit delete: {}", e)))?;

        debug!(node = %key, "deleted node");
        Ok(())
    }

    async fn list_nodes(&self, zone: &str) -> Result<Vec<NodeKey>, AgingError> {
        let zone = super::normalize_domain(zone);
        let conn = self.conn.lock().await;

        let mut stmt = conn
            .prepare("SELECT name FROM nodes WHERE zone = ?1 ORDER BY name")
            .map_err(|e| AgingError::StorageError(format!("Failed to prepare query: {}", e)))?;

        let names = stmt
            .query_map(params![zone], |row| row.get::<_, String>(0))
            .map_err(|e| AgingError::StorageError(format!("Failed to query nodes: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AgingError::StorageError(format!("Failed to read node: {}", e)))?;

        Ok(names
            .into_iter()
            .map(|name| NodeKey {
                zone: zone.clone(),
                name,
            })
            .collect())
    }
}

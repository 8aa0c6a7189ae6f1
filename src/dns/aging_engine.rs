//! Aging Engine
//!
//! Front door of the crate. Owns the zone registry (aging settings and serial
//! high-water per zone) and drives the dispatcher and the sweep against a
//! [`NodeStore`].
//!
//! Every change to a node is a read, a pure computation and a
//! compare-and-swap write. When another writer wins the race the engine
//! re-reads the node and recomputes from scratch, so a sibling refresh is
//! never applied on top of a state it was not computed from.
//!
//! Serials are reserved under the registry lock while the new node state is
//! computed. An attempt that then loses its race leaves a gap in the zone's
//! serial sequence; two writers never share a serial.

use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::node_store::NodeStore;
use super::scavenger::{plan_node, SweepAction, SweepReport};
use super::tombstone::{self, TombstoneState};
use super::update_dispatcher::{self, UpdateRequest, ZoneSerialState};
use super::{
    normalize_domain, AgingConfig, AgingError, AgingInstant, DnsNode, DnsRecord, DnsTimestamp,
    NodeKey, NtTime, UpdateSource, ZoneAgingConfig,
};
use crate::lock_utils::{read_lock_or_recover, write_lock_or_recover};

/// Registry entry for one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneState {
    pub config: ZoneAgingConfig,
    pub serial: ZoneSerialState,
}

/// What to do with a node once its new state is computed
enum NodeCommit {
    Write(DnsNode),
    Delete,
    Unchanged,
}

/// Record aging and scavenging engine
pub struct AgingEngine {
    store: Arc<dyn NodeStore>,
    zones: RwLock<HashMap<String, ZoneState>>,
    default_zone: ZoneAgingConfig,
    tombstone_lifetime_hours: u32,
    max_commit_retries: u32,
}

impl AgingEngine {
    /// Create an engine over `store` and register the configured zones
    pub fn new(store: Arc<dyn NodeStore>, config: &AgingConfig) -> Result<Self, AgingError> {
        config.validate()?;

        let engine = Self {
            store,
            zones: RwLock::new(HashMap::new()),
            default_zone: config.default_zone,
            tombstone_lifetime_hours: config.tombstone_lifetime_hours,
            max_commit_retries: config.max_commit_retries,
        };

        for zone in &config.zones {
            engine.register_zone(&zone.name, zone.aging)?;
        }

        Ok(engine)
    }

    pub fn tombstone_lifetime_hours(&self) -> u32 {
        self.tombstone_lifetime_hours
    }

    // =========================================================================
    // Zone registry
    // =========================================================================

    /// Register a zone, or replace the aging settings of a known one.
    /// The serial high-water of a known zone is kept.
    pub fn register_zone(&self, zone: &str, config: ZoneAgingConfig) -> Result<(), AgingError> {
        config.validate()?;
        let zone = normalize_domain(zone);
        if zone.is_empty() {
            return Err(AgingError::InvalidConfiguration(
                "zone name must not be empty".to_string(),
            ));
        }

        let mut zones = write_lock_or_recover(&self.zones, "zone registry");
        let serial = zones.get(&zone).map(|z| z.serial).unwrap_or_default();
        info!(
            zone = %zone,
            aging = config.enabled,
            no_refresh_hours = config.no_refresh_hours,
            refresh_hours = config.refresh_hours,
            "registered zone"
        );
        zones.insert(zone, ZoneState { config, serial });
        Ok(())
    }

    /// Switch aging on or off for a zone
    pub fn set_zone_aging(&self, zone: &str, enabled: bool) -> Result<(), AgingError> {
        let zone = normalize_domain(zone);
        let mut zones = write_lock_or_recover(&self.zones, "zone registry");
        let state = zones
            .get_mut(&zone)
            .ok_or_else(|| AgingError::ZoneNotFound(zone.clone()))?;
        state.config.enabled = enabled;
        info!(zone = %zone, aging = enabled, "zone aging toggled");
        Ok(())
    }

    pub fn zone_config(&self, zone: &str) -> Result<ZoneAgingConfig, AgingError> {
        self.zone_state(zone).map(|s| s.config)
    }

    /// Highest serial handed out in a zone
    pub fn zone_serial(&self, zone: &str) -> Result<u32, AgingError> {
        self.zone_state(zone).map(|s| s.serial.high_water())
    }

    /// Raise a zone's serial high-water to at least `serial`
    pub fn seed_zone_serial(&self, zone: &str, serial: u32) -> Result<(), AgingError> {
        let zone = normalize_domain(zone);
        let mut zones = write_lock_or_recover(&self.zones, "zone registry");
        let state = zones
            .get_mut(&zone)
            .ok_or_else(|| AgingError::ZoneNotFound(zone.clone()))?;
        state.serial.observe(serial);
        Ok(())
    }

    /// Seed a zone's serial high-water from the records already stored
    pub async fn restore_zone_serial(&self, zone: &str) -> Result<u32, AgingError> {
        // fail early for unknown zones
        self.zone_state(zone)?;

        let mut highest = 0;
        for key in self.store.list_nodes(zone).await? {
            if let Some(stored) = self.store.read_node(&key).await? {
                highest = highest.max(stored.node.max_serial());
            }
        }
        self.seed_zone_serial(zone, highest)?;
        let serial = self.zone_serial(zone)?;
        debug!(zone = %normalize_domain(zone), serial, "restored zone serial");
        Ok(serial)
    }

    /// Registered zones, sorted
    pub fn zones(&self) -> Vec<String> {
        let zones = read_lock_or_recover(&self.zones, "zone registry");
        let mut names: Vec<String> = zones.keys().cloned().collect();
        names.sort();
        names
    }

    fn zone_state(&self, zone: &str) -> Result<ZoneState, AgingError> {
        let zone = normalize_domain(zone);
        let zones = read_lock_or_recover(&self.zones, "zone registry");
        zones
            .get(&zone)
            .copied()
            .ok_or(AgingError::ZoneNotFound(zone))
    }

    /// Run `reserve` against a zone's settings and serial with the registry
    /// write-locked. The advanced serial is kept only when `reserve`
    /// succeeds. A zone not yet registered starts from `default_zone`.
    fn with_zone_serial<T, F>(&self, zone: &str, reserve: F) -> Result<T, AgingError>
    where
        F: FnOnce(&ZoneAgingConfig, &mut ZoneSerialState) -> Result<T, AgingError>,
    {
        let zone = normalize_domain(zone);
        let mut zones = write_lock_or_recover(&self.zones, "zone registry");
        let mut state = zones.get(&zone).copied().unwrap_or(ZoneState {
            config: self.default_zone,
            serial: ZoneSerialState::default(),
        });

        let value = reserve(&state.config, &mut state.serial)?;
        if zones.insert(zone.clone(), state).is_none() {
            info!(zone = %zone, aging = state.config.enabled, "registered zone from defaults");
        }
        Ok(value)
    }

    /// Register `zone` with `default_zone` settings unless it is known
    fn adopt_zone(&self, zone: &str) {
        let zone = normalize_domain(zone);
        let mut zones = write_lock_or_recover(&self.zones, "zone registry");
        if !zones.contains_key(&zone) {
            info!(zone = %zone, aging = self.default_zone.enabled, "registered zone from defaults");
            zones.insert(
                zone,
                ZoneState {
                    config: self.default_zone,
                    serial: ZoneSerialState::default(),
                },
            );
        }
    }

    // =========================================================================
    // Record writes
    // =========================================================================

    /// Add a record, or modify the matching one, under the timestamp policy
    /// of `source`. Returns the record as stored.
    pub async fn apply_update(
        &self,
        key: &NodeKey,
        record: DnsRecord,
        source: UpdateSource,
        now: AgingInstant,
    ) -> Result<DnsRecord, AgingError> {
        self.dispatch(key, UpdateRequest::upsert(record, source), now)
            .await
    }

    /// Modify an existing record; fails with `RecordNotFound` if absent.
    pub async fn modify_record(
        &self,
        key: &NodeKey,
        record: DnsRecord,
        source: UpdateSource,
        now: AgingInstant,
    ) -> Result<DnsRecord, AgingError> {
        self.dispatch(key, UpdateRequest::modify(record, source), now)
            .await
    }

    async fn dispatch(
        &self,
        key: &NodeKey,
        request: UpdateRequest,
        now: AgingInstant,
    ) -> Result<DnsRecord, AgingError> {
        let outcome = self
            .commit_with_retry(key, |current| {
                let outcome = self.with_zone_serial(&key.zone, |config, serial| {
                    update_dispatcher::apply_update(current, key, &request, config, serial, now.hours)
                })?;
                Ok((NodeCommit::Write(outcome.node.clone()), outcome))
            })
            .await?;

        if outcome.untombstoned {
            info!(node = %key, "revived tombstoned node");
        }
        Ok(outcome.record)
    }

    /// Replace the whole record set of a node verbatim
    pub async fn replace_records(
        &self,
        key: &NodeKey,
        records: Vec<DnsRecord>,
    ) -> Result<(), AgingError> {
        if let Some(record) = records.iter().find(|r| r.is_tombstone()) {
            return Err(AgingError::InvalidRecord(format!(
                "tombstone records cannot be written through updates ({} {})",
                key,
                record.data_display()
            )));
        }

        self.commit_with_retry(key, |current| {
            let node = update_dispatcher::replace_records(current, key, records.clone());
            Ok((NodeCommit::Write(node), ()))
        })
        .await?;
        self.adopt_zone(&key.zone);

        debug!(node = %key, records = records.len(), "replaced node records");
        Ok(())
    }

    /// Remove one record from a node. A node left without records stays
    /// live until the sweep picks it up.
    pub async fn delete_record(&self, key: &NodeKey, record: &DnsRecord) -> Result<(), AgingError> {
        self.zone_state(&key.zone)?;
        self.commit_with_retry(key, |current| {
            let node = update_dispatcher::delete_record(current, key, record)?;
            Ok((NodeCommit::Write(node), ()))
        })
        .await?;

        debug!(node = %key, record = %record, "deleted record");
        Ok(())
    }

    // =========================================================================
    // Tombstones
    // =========================================================================

    /// Tombstone an existing node at the given instant
    pub async fn tombstone_node(
        &self,
        key: &NodeKey,
        hours: DnsTimestamp,
        entombed: NtTime,
    ) -> Result<(), AgingError> {
        self.zone_state(&key.zone)?;
        self.commit_with_retry(key, |current| {
            let mut node = current
                .cloned()
                .ok_or_else(|| AgingError::NodeNotFound(key.to_string()))?;
            tombstone::tombstone(&mut node, hours, entombed);
            Ok((NodeCommit::Write(node), ()))
        })
        .await?;

        info!(node = %key, hours = %hours, entombed = %entombed, "tombstoned node");
        Ok(())
    }

    /// Tombstone status of a node
    pub async fn tombstone_query(&self, key: &NodeKey) -> Result<TombstoneState, AgingError> {
        let node = self
            .get_node(key)
            .await?
            .ok_or_else(|| AgingError::NodeNotFound(key.to_string()))?;
        Ok(tombstone::tombstone_state(&node))
    }

    pub async fn get_node(&self, key: &NodeKey) -> Result<Option<DnsNode>, AgingError> {
        Ok(self.store.read_node(key).await?.map(|v| v.node))
    }

    // =========================================================================
    // Scavenging
    // =========================================================================

    /// Sweep one zone: tombstone stale nodes and delete expired tombstones.
    ///
    /// Each node is its own transaction. A node that cannot be processed is
    /// logged and listed under `skipped`; the sweep carries on.
    pub async fn run_sweep(&self, zone: &str, now: AgingInstant) -> Result<SweepReport, AgingError> {
        let zone = normalize_domain(zone);
        let config = self.zone_config(&zone)?;
        let lifetime = self.tombstone_lifetime_hours;
        let mut report = SweepReport::new(zone.clone());

        for key in self.store.list_nodes(&zone).await? {
            report.examined += 1;

            let result = self
                .commit_with_retry(&key, |current| {
                    let Some(node) = current else {
                        return Ok((NodeCommit::Unchanged, SweepAction::Keep));
                    };
                    let action = plan_node(node, &config, lifetime, now);
                    let commit = match action {
                        SweepAction::Keep => NodeCommit::Unchanged,
                        SweepAction::Tombstone => {
                            let mut node = node.clone();
                            tombstone::tombstone(&mut node, now.hours, now.nttime);
                            NodeCommit::Write(node)
                        }
                        SweepAction::Delete => NodeCommit::Delete,
                    };
                    Ok((commit, action))
                })
                .await;

            match result {
                Ok(action) => {
                    match action {
                        SweepAction::Tombstone => info!(node = %key, "scavenged stale node"),
                        SweepAction::Delete => info!(node = %key, "deleted expired tombstone"),
                        SweepAction::Keep => {}
                    }
                    report.record(key, action);
                }
                Err(e) => {
                    warn!(node = %key, error = %e, "sweep skipped node");
                    report.skip(key, e.to_string());
                }
            }
        }

        if report.is_empty() {
            debug!(zone = %zone, examined = report.examined, "sweep found nothing to do");
        } else {
            info!(
                zone = %zone,
                examined = report.examined,
                tombstoned = report.tombstoned.len(),
                deleted = report.deleted.len(),
                skipped = report.skipped.len(),
                "sweep complete"
            );
        }

        Ok(report)
    }

    /// Sweep every registered zone
    pub async fn run_sweep_all(&self, now: AgingInstant) -> Result<Vec<SweepReport>, AgingError> {
        let mut reports = Vec::new();
        for zone in self.zones() {
            reports.push(self.run_sweep(&zone, now).await?);
        }
        Ok(reports)
    }

    // =========================================================================
    // Commit loop
    // =========================================================================

    /// Read `key`, let `plan` compute the new state, and commit it against
    /// the version that was read. Lost races are retried with a short random
    /// back-off up to `max_commit_retries` times.
    async fn commit_with_retry<T, F>(&self, key: &NodeKey, mut plan: F) -> Result<T, AgingError>
    where
        F: FnMut(Option<&DnsNode>) -> Result<(NodeCommit, T), AgingError>,
    {
        let mut attempt = 0;
        loop {
            let current = self.store.read_node(key).await?;
            let expected = current.as_ref().map(|v| v.version);
            let (commit, value) = plan(current.as_ref().map(|v| &v.node))?;

            let result = match commit {
                NodeCommit::Write(node) => self.store.write_node(&node, expected).await.map(|_| ()),
                NodeCommit::Delete => match expected {
                    Some(version) => self.store.delete_node(key, version).await,
                    None => Ok(()),
                },
                NodeCommit::Unchanged => Ok(()),
            };

            match result {
                Ok(()) => return Ok(value),
                Err(AgingError::ConcurrentModification(reason))
                    if attempt < self.max_commit_retries =>
                {
                    attempt += 1;
                    let backoff = rand::thread_rng().gen_range(1..=10u64);
                    debug!(node = %key, attempt, backoff_ms = backoff, %reason, "retrying node commit");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    if matches!(e, AgingError::ConcurrentModification(_)) {
                        warn!(node = %key, attempts = attempt + 1, "giving up on contended node");
                    }
                    return Err(e);
                }
            }
        }
    }
}

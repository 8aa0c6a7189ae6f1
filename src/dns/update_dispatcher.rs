//! Update Dispatcher
//!
//! Computes the new record set of a node for one inbound write. The
//! computation is pure: it works on a copy of the node and returns the whole
//! result, so the caller can commit it as a single transaction or throw it
//! away and recompute after a conflicting write.
//!
//! ## Timestamp policy
//!
//! | source              | add                              | modify                                  |
//! |---------------------|----------------------------------|-----------------------------------------|
//! | administrative edit | verbatim                         | verbatim                                |
//! | management update   | static                           | static                                  |
//! | dynamic update      | `now`, or static if node has one | kept inside the no-refresh window, else `now` |
//!
//! A dynamic refresh also re-stamps siblings: every non-static sibling when
//! aging is off, only siblings past their own no-refresh window when aging
//! is on. A dynamic add re-stamps all non-static siblings only when aging is
//! off and the new record is not static.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tombstone;
use super::{
    AgingError, DnsNode, DnsRecord, DnsTimestamp, NodeKey, UpdateSource, ZoneAgingConfig,
    DNS_RANK_ZONE,
};

/// High-water serial of a zone.
///
/// Serials compare with RFC 1982 serial number arithmetic, so the sequence
/// wraps from `u32::MAX` back to 1 and keeps advancing. 0 is never handed
/// out; it marks a record or zone that has no serial yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSerialState {
    high_water: u32,
}

impl ZoneSerialState {
    pub fn new(high_water: u32) -> Self {
        Self { high_water }
    }

    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Hand out the serial for a write replacing a record whose serial was
    /// `previous` (`None` for an add).
    pub fn advance(&mut self, previous: Option<u32>) -> u32 {
        let base = later_serial(self.high_water, previous.unwrap_or(0));
        let next = match base.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        self.high_water = next;
        next
    }

    /// Raise the high-water mark to `serial` if `serial` is ahead of it
    pub fn observe(&mut self, serial: u32) {
        self.high_water = later_serial(self.high_water, serial);
    }
}

/// The later of two serials under RFC 1982 arithmetic. Serials exactly half
/// the space apart are incomparable; `a` wins.
fn later_serial(a: u32, b: u32) -> u32 {
    if a == 0 {
        return b;
    }
    if b == 0 {
        return a;
    }
    if b != a && b.wrapping_sub(a) < 1 << 31 {
        b
    } else {
        a
    }
}

/// Whether the write may create the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Add the record, or modify it if it already exists
    Upsert,
    /// Modify an existing record; fail if it is absent
    ModifyExisting,
}

/// One inbound write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub record: DnsRecord,
    pub source: UpdateSource,
    pub mode: WriteMode,
}

impl UpdateRequest {
    pub fn upsert(record: DnsRecord, source: UpdateSource) -> Self {
        Self {
            record,
            source,
            mode: WriteMode::Upsert,
        }
    }

    pub fn modify(record: DnsRecord, source: UpdateSource) -> Self {
        Self {
            record,
            source,
            mode: WriteMode::ModifyExisting,
        }
    }
}

/// Whether the write created the record or replaced a matching one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Add,
    Modify,
}

/// Result of dispatching one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The node as it must be committed
    pub node: DnsNode,
    /// The record as stored
    pub record: DnsRecord,
    pub kind: WriteKind,
    /// Siblings whose timestamp moved to `now`
    pub refreshed_siblings: usize,
    /// Whether the write revived a tombstoned node
    pub untombstoned: bool,
}

/// Apply one write to (a copy of) `current`.
///
/// `serial` is advanced in place for dynamic and management writes; the
/// caller should only keep the advanced state once the node is committed.
pub fn apply_update(
    current: Option<&DnsNode>,
    key: &NodeKey,
    request: &UpdateRequest,
    config: &ZoneAgingConfig,
    serial: &mut ZoneSerialState,
    now: DnsTimestamp,
) -> Result<UpdateOutcome, AgingError> {
    if request.record.is_tombstone() {
        return Err(AgingError::InvalidRecord(format!(
            "tombstone records cannot be written through updates ({})",
            key
        )));
    }

    let mut node = match current {
        Some(node) => node.clone(),
        None if request.mode == WriteMode::ModifyExisting => {
            return Err(AgingError::NodeNotFound(key.to_string()));
        }
        None => DnsNode::new(key.clone()),
    };

    if request.mode == WriteMode::ModifyExisting
        && (node.tombstoned || node.position(&request.record).is_none())
    {
        return Err(AgingError::RecordNotFound(format!(
            "{} {} at {}",
            request.record.record_type,
            request.record.data_display(),
            key
        )));
    }

    let untombstoned = tombstone::untombstone(&mut node);
    let existing = node.position(&request.record);
    let kind = if existing.is_some() {
        WriteKind::Modify
    } else {
        WriteKind::Add
    };

    let (record, refreshed_siblings) = match request.source {
        UpdateSource::AdministrativeEdit => {
            administrative_edit(&mut node, existing, &request.record)
        }
        UpdateSource::ManagementUpdate => {
            management_update(&mut node, existing, &request.record, serial)
        }
        UpdateSource::DynamicUpdate => {
            dynamic_update(&mut node, existing, &request.record, config, serial, now)
        }
    };

    debug!(
        node = %key,
        source = %request.source,
        kind = ?kind,
        timestamp = %record.timestamp,
        serial = record.serial,
        refreshed_siblings,
        untombstoned,
        "dispatched record write"
    );

    Ok(UpdateOutcome {
        node,
        record,
        kind,
        refreshed_siblings,
        untombstoned,
    })
}

/// Replace a node's whole record set verbatim. Revives a tombstoned node.
pub fn replace_records(current: Option<&DnsNode>, key: &NodeKey, records: Vec<DnsRecord>) -> DnsNode {
    let mut node = current
        .cloned()
        .unwrap_or_else(|| DnsNode::new(key.clone()));
    tombstone::untombstone(&mut node);
    node.records = records;
    node
}

/// Remove the record matching `record` from a live node.
pub fn delete_record(current: Option<&DnsNode>, key: &NodeKey, record: &DnsRecord) -> Result<DnsNode, AgingError> {
    let mut node = current
        .cloned()
        .ok_or_else(|| AgingError::NodeNotFound(key.to_string()))?;
    let position = if node.tombstoned {
        None
    } else {
        node.position(record)
    };
    let Some(idx) = position else {
        return Err(AgingError::RecordNotFound(format!(
            "{} {} at {}",
            record.record_type,
            record.data_display(),
            key
        )));
    };
    node.records.remove(idx);
    Ok(node)
}

fn administrative_edit(
    node: &mut DnsNode,
    existing: Option<usize>,
    requested: &DnsRecord,
) -> (DnsRecord, usize) {
    let record = requested.clone();
    store(node, existing, record.clone());
    (record, 0)
}

fn management_update(
    node: &mut DnsNode,
    existing: Option<usize>,
    requested: &DnsRecord,
    serial: &mut ZoneSerialState,
) -> (DnsRecord, usize) {
    let mut record = requested.clone();
    record.timestamp = DnsTimestamp::STATIC;
    record.rank = DNS_RANK_ZONE;
    record.flags = 0;
    record.reserved = 0;
    if let Some(idx) = existing {
        record.foreign_flags = node.records[idx].foreign_flags;
    }
    record.serial = serial.advance(existing.map(|idx| node.records[idx].serial));

    store(node, existing, record.clone());
    (record, 0)
}

fn dynamic_update(
    node: &mut DnsNode,
    existing: Option<usize>,
    requested: &DnsRecord,
    config: &ZoneAgingConfig,
    serial: &mut ZoneSerialState,
    now: DnsTimestamp,
) -> (DnsRecord, usize) {
    let mut record = requested.clone();
    record.rank = DNS_RANK_ZONE;
    record.flags = 0;
    record.reserved = 0;

    let refreshed = match existing {
        Some(idx) => {
            let previous = &node.records[idx];
            record.foreign_flags = previous.foreign_flags;
            record.serial = serial.advance(Some(previous.serial));

            if previous.is_static() {
                record.timestamp = DnsTimestamp::STATIC;
                0
            } else if previous.timestamp.age_at(now) < config.no_refresh_hours {
                record.timestamp = previous.timestamp;
                0
            } else {
                record.timestamp = now;
                let min_age = if config.enabled {
                    config.no_refresh_hours
                } else {
                    0
                };
                refresh_siblings(&mut node.records, Some(idx), now, min_age)
            }
        }
        None => {
            record.serial = serial.advance(None);

            if node.has_static_record() {
                record.timestamp = DnsTimestamp::STATIC;
                0
            } else {
                record.timestamp = now;
                if config.enabled {
                    0
                } else {
                    refresh_siblings(&mut node.records, None, now, 0)
                }
            }
        }
    };

    store(node, existing, record.clone());
    (record, refreshed)
}

/// Move non-static siblings aged at least `min_age` hours to `now`.
fn refresh_siblings(
    records: &mut [DnsRecord],
    skip: Option<usize>,
    now: DnsTimestamp,
    min_age: u32,
) -> usize {
    let mut refreshed = 0;
    for (idx, record) in records.iter_mut().enumerate() {
        if Some(idx) == skip || record.is_static() || record.timestamp == now {
            continue;
        }
        if record.timestamp.age_at(now) >= min_age {
            record.timestamp = now;
            refreshed += 1;
        }
    }
    refreshed
}

fn store(node: &mut DnsNode, existing: Option<usize>, record: DnsRecord) {
    match existing {
        Some(idx) => node.records[idx] = record,
        None => node.records.push(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::NtTime;

    const NOW: u32 = 3_500_000;

    fn now() -> DnsTimestamp {
        DnsTimestamp::from_hours(NOW)
    }

    fn ago(hours: u32) -> DnsTimestamp {
        now().rewound(hours)
    }

    fn key() -> NodeKey {
        NodeKey::new("example.com", "test")
    }

    fn txt(text: &str) -> DnsRecord {
        DnsRecord::txt(text, 900)
    }

    fn node(records: Vec<DnsRecord>) -> DnsNode {
        DnsNode::with_records(key(), records)
    }

    fn dynamic(
        current: &DnsNode,
        text: &str,
        config: &ZoneAgingConfig,
    ) -> UpdateOutcome {
        let mut serial = ZoneSerialState::default();
        apply_update(
            Some(current),
            &key(),
            &UpdateRequest::upsert(txt(text), UpdateSource::DynamicUpdate),
            config,
            &mut serial,
            now(),
        )
        .unwrap()
    }

    fn timestamp_of(node: &DnsNode, text: &str) -> DnsTimestamp {
        node.find(&txt(text)).unwrap().timestamp
    }

    fn aging_on() -> ZoneAgingConfig {
        ZoneAgingConfig::enabled()
    }

    fn aging_off() -> ZoneAgingConfig {
        ZoneAgingConfig::default()
    }

    #[test]
    fn test_dynamic_add_on_new_node() {
        let mut serial = ZoneSerialState::default();
        let outcome = apply_update(
            None,
            &key(),
            &UpdateRequest::upsert(txt("a"), UpdateSource::DynamicUpdate),
            &aging_on(),
            &mut serial,
            now(),
        )
        .unwrap();

        assert_eq!(outcome.kind, WriteKind::Add);
        assert_eq!(outcome.record.timestamp, now());
        assert_eq!(outcome.record.serial, 1);
        assert_eq!(outcome.node.records.len(), 1);
        assert_eq!(serial.high_water(), 1);
    }

    #[test]
    fn test_dynamic_modify_inside_no_refresh_window_keeps_timestamp() {
        for config in [aging_on(), aging_off()] {
            let current = node(vec![
                txt("a").with_timestamp(ago(86)),
                txt("b").with_timestamp(ago(200)),
            ]);
            let outcome = dynamic(&current, "a", &config);
            assert_eq!(outcome.kind, WriteKind::Modify);
            assert_eq!(outcome.record.timestamp, ago(86));
            assert_eq!(timestamp_of(&outcome.node, "b"), ago(200));
            assert_eq!(outcome.refreshed_siblings, 0);
        }
    }

    #[test]
    fn test_dynamic_modify_on_no_refresh_boundary_refreshes() {
        let current = node(vec![txt("a").with_timestamp(ago(168))]);
        let outcome = dynamic(&current, "a", &aging_on());
        assert_eq!(outcome.record.timestamp, now());
    }

    #[test]
    fn test_aging_on_refresh_only_touches_stale_siblings() {
        let current = node(vec![
            txt("1").with_timestamp(ago(15 * 24)),
            txt("2").with_timestamp(ago(6 * 24)),
            txt("3").with_timestamp(ago(8 * 24)),
        ]);
        let outcome = dynamic(&current, "1", &aging_on());
        assert_eq!(timestamp_of(&outcome.node, "1"), now());
        assert_eq!(timestamp_of(&outcome.node, "2"), ago(6 * 24));
        assert_eq!(timestamp_of(&outcome.node, "3"), now());
        assert_eq!(outcome.refreshed_siblings, 1);
    }

    #[test]
    fn test_aging_off_refresh_touches_all_live_siblings() {
        let current = node(vec![
            txt("1").with_timestamp(ago(15 * 24)),
            txt("2").with_timestamp(ago(6 * 24)),
            txt("3"),
        ]);
        let outcome = dynamic(&current, "1", &aging_off());
        assert_eq!(timestamp_of(&outcome.node, "1"), now());
        assert_eq!(timestamp_of(&outcome.node, "2"), now());
        assert!(timestamp_of(&outcome.node, "3").is_static());
        assert_eq!(outcome.refreshed_siblings, 1);
    }

    #[test]
    fn test_aging_off_add_restamps_node() {
        let current = node(vec![txt("A").with_timestamp(ago(8 * 24))]);
        let outcome = dynamic(&current, "B", &aging_off());
        assert_eq!(outcome.kind, WriteKind::Add);
        assert_eq!(timestamp_of(&outcome.node, "B"), now());
        assert_eq!(timestamp_of(&outcome.node, "A"), now());
    }

    #[test]
    fn test_aging_on_add_leaves_siblings() {
        let current = node(vec![txt("A").with_timestamp(ago(8 * 24))]);
        let outcome = dynamic(&current, "B", &aging_on());
        assert_eq!(timestamp_of(&outcome.node, "B"), now());
        assert_eq!(timestamp_of(&outcome.node, "A"), ago(8 * 24));
    }

    #[test]
    fn test_add_next_to_static_record_is_static() {
        for config in [aging_on(), aging_off()] {
            let current = node(vec![
                txt("static"),
                txt("old").with_timestamp(ago(30 * 24)),
            ]);
            let outcome = dynamic(&current, "new", &config);
            assert!(outcome.record.is_static());
            assert_eq!(timestamp_of(&outcome.node, "old"), ago(30 * 24));
            assert_eq!(outcome.refreshed_siblings, 0);
        }
    }

    #[test]
    fn test_modify_static_record_stays_static() {
        let current = node(vec![txt("s"), txt("d").with_timestamp(ago(20 * 24))]);
        let outcome = dynamic(&current, "s", &aging_off());
        assert!(outcome.record.is_static());
        assert_eq!(timestamp_of(&outcome.node, "d"), ago(20 * 24));
    }

    #[test]
    fn test_modify_dynamic_record_beside_static_sibling() {
        let current = node(vec![txt("s"), txt("d").with_timestamp(ago(8 * 24))]);
        let outcome = dynamic(&current, "d", &aging_on());
        assert_eq!(outcome.record.timestamp, now());
        assert!(timestamp_of(&outcome.node, "s").is_static());
    }

    #[test]
    fn test_dynamic_fixes_rank_flags_reserved() {
        let current = node(vec![txt("a")
            .with_timestamp(ago(2))
            .with_rank(22)
            .with_flags(33)
            .with_reserved(66)
            .with_serial(44)]);
        let mut serial = ZoneSerialState::default();
        let request = UpdateRequest::upsert(
            DnsRecord::txt("a", 999).with_rank(1).with_flags(2).with_reserved(3),
            UpdateSource::DynamicUpdate,
        );
        let outcome =
            apply_update(Some(&current), &key(), &request, &aging_off(), &mut serial, now()).unwrap();
        assert_eq!(outcome.record.rank, DNS_RANK_ZONE);
        assert_eq!(outcome.record.flags, 0);
        assert_eq!(outcome.record.reserved, 0);
        assert_eq!(outcome.record.ttl, 999);
        assert_eq!(outcome.record.serial, 45);
    }

    #[test]
    fn test_writes_keep_foreign_flag_byte() {
        let current = node(vec![txt("a")
            .with_timestamp(ago(2))
            .with_flags(33)
            .with_foreign_flags(0x81)]);
        for source in [UpdateSource::DynamicUpdate, UpdateSource::ManagementUpdate] {
            let mut serial = ZoneSerialState::default();
            let request = UpdateRequest::upsert(txt("a").with_flags(5), source);
            let outcome =
                apply_update(Some(&current), &key(), &request, &aging_on(), &mut serial, now())
                    .unwrap();
            assert_eq!(outcome.record.flags, 0, "{:?}", source);
            assert_eq!(outcome.record.foreign_flags, 0x81, "{:?}", source);
        }

        // an add takes the byte from the submitted record
        let mut serial = ZoneSerialState::default();
        let request = UpdateRequest::upsert(
            txt("b").with_flags(9).with_foreign_flags(0x02),
            UpdateSource::DynamicUpdate,
        );
        let added =
            apply_update(Some(&current), &key(), &request, &aging_on(), &mut serial, now()).unwrap();
        assert_eq!(added.record.flags, 0);
        assert_eq!(added.record.foreign_flags, 0x02);
    }

    #[test]
    fn test_serial_wraps_past_u32_max() {
        let mut serial = ZoneSerialState::new(u32::MAX - 1);
        assert_eq!(serial.advance(None), u32::MAX);
        assert_eq!(serial.advance(None), 1);

        // a record stamped before the wrap is behind the new high-water
        assert_eq!(serial.advance(Some(u32::MAX)), 2);
        serial.observe(u32::MAX - 5);
        assert_eq!(serial.high_water(), 2);

        serial.observe(40);
        assert_eq!(serial.advance(Some(7)), 41);
    }

    #[test]
    fn test_dispatch_serials_keep_advancing_across_wrap() {
        let mut serial = ZoneSerialState::new(u32::MAX);
        let mut current = node(vec![txt("a").with_timestamp(ago(2)).with_serial(u32::MAX)]);
        let mut seen = Vec::new();
        for _ in 0..3 {
            let outcome = apply_update(
                Some(&current),
                &key(),
                &UpdateRequest::upsert(txt("a"), UpdateSource::ManagementUpdate),
                &aging_on(),
                &mut serial,
                now(),
            )
            .unwrap();
            seen.push(outcome.record.serial);
            current = outcome.node;
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_management_forces_static_and_zone_rank() {
        let current = node(vec![txt("a").with_timestamp(ago(3))]);
        let mut serial = ZoneSerialState::new(10);
        let request = UpdateRequest::upsert(
            txt("b")
                .with_timestamp(ago(8 * 24))
                .with_flags(0xff)
                .with_rank(3)
                .with_reserved(54321)
                .with_serial(123),
            UpdateSource::ManagementUpdate,
        );
        let added =
            apply_update(Some(&current), &key(), &request, &aging_on(), &mut serial, now()).unwrap();
        assert_eq!(added.kind, WriteKind::Add);
        assert!(added.record.is_static());
        assert_eq!(added.record.rank, DNS_RANK_ZONE);
        assert_eq!(added.record.flags, 0);
        assert_eq!(added.record.reserved, 0);
        assert_eq!(added.record.serial, 11);
        assert_eq!(timestamp_of(&added.node, "a"), ago(3));

        let modified =
            apply_update(Some(&added.node), &key(), &request, &aging_on(), &mut serial, now())
                .unwrap();
        assert_eq!(modified.kind, WriteKind::Modify);
        assert!(modified.record.is_static());
        assert_eq!(modified.record.serial, 12);
    }

    #[test]
    fn test_administrative_edit_is_verbatim() {
        let current = node(vec![txt("a").with_timestamp(ago(3)).with_serial(500)]);
        let mut serial = ZoneSerialState::new(600);
        let edited = txt("a")
            .with_timestamp(DnsTimestamp::from_hours(123456))
            .with_serial(12)
            .with_rank(9)
            .with_flags(77)
            .with_reserved(54321);
        let outcome = apply_update(
            Some(&current),
            &key(),
            &UpdateRequest::upsert(edited.clone(), UpdateSource::AdministrativeEdit),
            &aging_on(),
            &mut serial,
            now(),
        )
        .unwrap();
        assert_eq!(outcome.record, edited);
        assert_eq!(outcome.node.records, vec![edited]);
        assert_eq!(serial.high_water(), 600);
    }

    #[test]
    fn test_serial_continues_from_high_water() {
        let current = node(vec![txt("a").with_serial(12)]);
        let mut serial = ZoneSerialState::new(123);
        let outcome = apply_update(
            Some(&current),
            &key(),
            &UpdateRequest::upsert(txt("b"), UpdateSource::DynamicUpdate),
            &aging_off(),
            &mut serial,
            now(),
        )
        .unwrap();
        assert_eq!(outcome.record.serial, 124);
        assert_eq!(serial.high_water(), 124);
    }

    #[test]
    fn test_update_revives_tombstoned_node() {
        let mut current = node(vec![txt("old")]);
        tombstone::tombstone(&mut current, ago(1000), NtTime::from_hours(ago(1000)));
        let outcome = dynamic(&current, "fresh", &aging_on());
        assert!(outcome.untombstoned);
        assert!(!outcome.node.tombstoned);
        assert_eq!(outcome.kind, WriteKind::Add);
        assert_eq!(outcome.node.records.len(), 1);
        assert_eq!(outcome.record.timestamp, now());
    }

    #[test]
    fn test_modify_existing_requires_record() {
        let mut serial = ZoneSerialState::default();
        let request = UpdateRequest::modify(txt("missing"), UpdateSource::ManagementUpdate);

        let err = apply_update(None, &key(), &request, &aging_on(), &mut serial, now()).unwrap_err();
        assert!(matches!(err, AgingError::NodeNotFound(_)));

        let current = node(vec![txt("present")]);
        let err = apply_update(Some(&current), &key(), &request, &aging_on(), &mut serial, now())
            .unwrap_err();
        assert!(matches!(err, AgingError::RecordNotFound(_)));
        assert_eq!(serial.high_water(), 0);
    }

    #[test]
    fn test_tombstone_record_rejected() {
        let mut serial = ZoneSerialState::default();
        let request = UpdateRequest::upsert(
            DnsRecord::tombstone(now(), NtTime::from_hours(now())),
            UpdateSource::AdministrativeEdit,
        );
        assert!(matches!(
            apply_update(None, &key(), &request, &aging_on(), &mut serial, now()),
            Err(AgingError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_replace_and_delete_records() {
        let mut current = node(vec![txt("a")]);
        tombstone::tombstone(&mut current, now(), NtTime::from_hours(now()));

        let replaced = replace_records(Some(&current), &key(), vec![txt("b"), txt("c")]);
        assert!(!replaced.tombstoned);
        assert_eq!(replaced.records.len(), 2);

        let deleted = delete_record(Some(&replaced), &key(), &txt("b")).unwrap();
        assert_eq!(deleted.records, vec![txt("c")]);

        assert!(matches!(
            delete_record(Some(&deleted), &key(), &txt("b")),
            Err(AgingError::RecordNotFound(_))
        ));
        assert!(matches!(
            delete_record(None, &key(), &txt("b")),
            Err(AgingError::NodeNotFound(_))
        ));
    }

    mod proptest_policy {
        use super::*;
        use proptest::prelude::*;

        fn config_strategy() -> impl Strategy<Value = ZoneAgingConfig> {
            (any::<bool>(), 1u32..=2000, 1u32..=2000)
                .prop_map(|(enabled, nr, r)| ZoneAgingConfig::new(enabled, nr, r))
        }

        // Sibling timestamps: static, or up to ~3 years old
        fn sibling_strategy() -> impl Strategy<Value = Vec<u32>> {
            prop::collection::vec(prop_oneof![Just(0u32), 1u32..=26_280], 0..6)
        }

        fn source_strategy() -> impl Strategy<Value = UpdateSource> {
            prop_oneof![
                Just(UpdateSource::DynamicUpdate),
                Just(UpdateSource::ManagementUpdate)
            ]
        }

        fn build_node(target: Option<DnsTimestamp>, siblings: &[u32]) -> DnsNode {
            let mut records: Vec<DnsRecord> = siblings
                .iter()
                .enumerate()
                .map(|(i, age)| {
                    let ts = if *age == 0 {
                        DnsTimestamp::STATIC
                    } else {
                        ago(*age)
                    };
                    txt(&format!("sibling-{}", i)).with_timestamp(ts)
                })
                .collect();
            if let Some(ts) = target {
                records.push(txt("target").with_timestamp(ts));
            }
            node(records)
        }

        proptest! {
            #[test]
            fn prop_static_record_stays_static(
                config in config_strategy(),
                siblings in sibling_strategy(),
                source in source_strategy(),
                caller_ts in any::<u32>(),
            ) {
                let current = build_node(Some(DnsTimestamp::STATIC), &siblings);
                let mut serial = ZoneSerialState::default();
                let request = UpdateRequest::upsert(
                    txt("target").with_timestamp(DnsTimestamp::from_hours(caller_ts)),
                    source,
                );
                let outcome = apply_update(Some(&current), &key(), &request, &config, &mut serial, now()).unwrap();
                prop_assert!(outcome.record.is_static());
                // static siblings are never touched either
                for (before, after) in current.records.iter().zip(outcome.node.records.iter()) {
                    if before.is_static() {
                        prop_assert!(after.is_static());
                    }
                }
            }

            #[test]
            fn prop_no_refresh_window_holds(
                config in config_strategy(),
                siblings in sibling_strategy(),
                fraction in 0.0f64..1.0,
            ) {
                let age = ((config.no_refresh_hours as f64 * fraction) as u32)
                    .min(config.no_refresh_hours - 1);
                let ts = DnsTimestamp::from_hours(NOW - age);
                let current = build_node(Some(ts), &siblings);
                let outcome = dynamic(&current, "target", &config);
                prop_assert_eq!(outcome.record.timestamp, ts);
                prop_assert_eq!(outcome.refreshed_siblings, 0);
                for (before, after) in current.records.iter().zip(outcome.node.records.iter()) {
                    prop_assert_eq!(before.timestamp, after.timestamp);
                }
            }

            #[test]
            fn prop_management_zeroes_timestamp(
                config in config_strategy(),
                siblings in sibling_strategy(),
                existing_age in prop::option::of(1u32..=26_280),
                caller_ts in any::<u32>(),
                high_water in 0u32..1_000_000,
            ) {
                let current = build_node(existing_age.map(ago), &siblings);
                let previous_serial = current.find(&txt("target")).map(|r| r.serial);
                let mut serial = ZoneSerialState::new(high_water);
                let request = UpdateRequest::upsert(
                    txt("target").with_timestamp(DnsTimestamp::from_hours(caller_ts)),
                    UpdateSource::ManagementUpdate,
                );
                let outcome = apply_update(Some(&current), &key(), &request, &config, &mut serial, now()).unwrap();
                prop_assert!(outcome.record.is_static());
                prop_assert_eq!(
                    outcome.record.serial,
                    high_water.max(previous_serial.unwrap_or(0)) + 1
                );
                prop_assert_eq!(serial.high_water(), outcome.record.serial);
            }

            #[test]
            fn prop_dynamic_never_creates_static_from_live(
                config in config_strategy(),
                siblings in prop::collection::vec(1u32..=26_280, 0..6),
                target_age in 1u32..=26_280,
            ) {
                let current = build_node(Some(ago(target_age)), &siblings);
                let outcome = dynamic(&current, "target", &config);
                for record in &outcome.node.records {
                    prop_assert!(!record.is_static());
                }
            }
        }
    }
}

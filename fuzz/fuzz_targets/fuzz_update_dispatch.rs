//! Fuzz target for the update dispatcher
//!
//! Drives arbitrary writes against arbitrary nodes and checks that static
//! records stay static under dynamic and management updates.
//!
//! Run with: cargo +nightly fuzz run fuzz_update_dispatch

#![no_main]

use arbitrary::Arbitrary;
use dns_aging::dns::update_dispatcher::apply_update;
use dns_aging::dns::{
    DnsNode, DnsRecord, DnsTimestamp, NodeKey, UpdateRequest, UpdateSource, ZoneAgingConfig,
    ZoneSerialState,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    timestamps: Vec<u32>,
    target: u8,
    source: u8,
    aging: bool,
    no_refresh: u32,
    refresh: u32,
    now: u32,
    serial: u32,
}

fuzz_target!(|input: Input| {
    let key = NodeKey::new("fuzz.example", "node");
    let records: Vec<DnsRecord> = input
        .timestamps
        .iter()
        .take(16)
        .enumerate()
        .map(|(i, ts)| DnsRecord::txt(&i.to_string(), 60).with_timestamp(DnsTimestamp::from_hours(*ts)))
        .collect();
    let node = DnsNode::with_records(key.clone(), records);

    let source = match input.source % 3 {
        0 => UpdateSource::DynamicUpdate,
        1 => UpdateSource::ManagementUpdate,
        _ => UpdateSource::AdministrativeEdit,
    };
    let target = DnsRecord::txt(&(input.target % 20).to_string(), 60);
    let was_static = node.find(&target).map(|r| r.is_static()).unwrap_or(false);

    let config = ZoneAgingConfig::new(input.aging, input.no_refresh.max(1), input.refresh.max(1));
    let mut serial = ZoneSerialState::new(input.serial);
    let request = UpdateRequest::upsert(target, source);

    if let Ok(outcome) = apply_update(
        Some(&node),
        &key,
        &request,
        &config,
        &mut serial,
        DnsTimestamp::from_hours(input.now.max(1)),
    ) {
        if was_static && source != UpdateSource::AdministrativeEdit {
            assert!(outcome.record.is_static());
        }
        assert_eq!(
            outcome.node.records.len(),
            node.records.len() + usize::from(outcome.kind == dns_aging::dns::WriteKind::Add)
        );
    }
});

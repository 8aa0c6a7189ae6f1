//! DNS Record Aging & Scavenging
//!
//! Keeps dynamically registered DNS records fresh and removes the ones whose
//! owners stopped refreshing them.
//!
//! ## Architecture
//!
//! ```text
//! Update (dynamic / management / admin) → AgingEngine → Update Dispatcher
//!                                              ↓
//!                                        NodeStore (CAS per node)
//!                                              ↑
//! Timer → Scavenging Sweep → plan_node → tombstone / delete
//! ```
//!
//! ## Components
//!
//! - `dns_timestamp`: hour and NTTIME clocks, `AgingInstant`
//! - `dns_types`: records, nodes, update sources, errors
//! - `dns_config`: zone aging windows and engine settings
//! - `record_codec`: persisted 24-byte record layout
//! - `update_dispatcher`: timestamp and serial policy per update source
//! - `tombstone`: tombstone and untombstone transitions
//! - `scavenger`: per-node sweep decisions and sweep reports
//! - `node_store`: storage trait and in-memory store
//! - `dns_persistence`: SQLite node store
//! - `aging_engine`: zone registry, commit loop, sweeps

pub mod dns_timestamp;
pub mod dns_types;
pub mod dns_config;
pub mod record_codec;
pub mod update_dispatcher;
pub mod tombstone;
pub mod scavenger;
pub mod node_store;
pub mod dns_persistence;
pub mod aging_engine;

pub use dns_timestamp::*;
pub use dns_types::*;
pub use dns_config::*;
pub use record_codec::*;
pub use update_dispatcher::{UpdateOutcome, UpdateRequest, WriteKind, WriteMode, ZoneSerialState};
pub use tombstone::TombstoneState;
pub use scavenger::*;
pub use node_store::*;
pub use dns_persistence::*;
pub use aging_engine::*;

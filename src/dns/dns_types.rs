//! DNS Record and Node Definitions
//!
//! Records are opaque `(type, data)` pairs carrying the aging metadata the
//! engine works on. Two records with the same type and data are the same
//! record across updates, whatever their TTL, serial or timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::{DnsTimestamp, NtTime};

/// Rank of authoritative zone data
pub const DNS_RANK_ZONE: u8 = 240;

/// Record format version written by this engine
pub const DNS_RECORD_VERSION: u8 = 5;

/// DNS record types known by name. Anything else is carried as `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    /// Placeholder left behind by a deleted node
    TOMBSTONE,
    /// IPv4 address record
    A,
    /// Name server
    NS,
    /// Canonical name (alias)
    CNAME,
    /// Start of authority
    SOA,
    /// Pointer record (reverse DNS)
    PTR,
    /// Mail exchange
    MX,
    /// Text record
    TXT,
    /// IPv6 address record
    AAAA,
    /// Service location
    SRV,
    /// Any other type code
    Other(u16),
}

impl DnsRecordType {
    /// Numeric type code
    pub fn code(&self) -> u16 {
        match self {
            DnsRecordType::TOMBSTONE => 0,
            DnsRecordType::A => 1,
            DnsRecordType::NS => 2,
            DnsRecordType::CNAME => 5,
            DnsRecordType::SOA => 6,
            DnsRecordType::PTR => 12,
            DnsRecordType::MX => 15,
            DnsRecordType::TXT => 16,
            DnsRecordType::AAAA => 28,
            DnsRecordType::SRV => 33,
            DnsRecordType::Other(code) => *code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            0 => DnsRecordType::TOMBSTONE,
            1 => DnsRecordType::A,
            2 => DnsRecordType::NS,
            5 => DnsRecordType::CNAME,
            6 => DnsRecordType::SOA,
            12 => DnsRecordType::PTR,
            15 => DnsRecordType::MX,
            16 => DnsRecordType::TXT,
            28 => DnsRecordType::AAAA,
            33 => DnsRecordType::SRV,
            other => DnsRecordType::Other(other),
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsRecordType::TOMBSTONE => write!(f, "TOMBSTONE"),
            DnsRecordType::A => write!(f, "A"),
            DnsRecordType::NS => write!(f, "NS"),
            DnsRecordType::CNAME => write!(f, "CNAME"),
            DnsRecordType::SOA => write!(f, "SOA"),
            DnsRecordType::PTR => write!(f, "PTR"),
            DnsRecordType::MX => write!(f, "MX"),
            DnsRecordType::TXT => write!(f, "TXT"),
            DnsRecordType::AAAA => write!(f, "AAAA"),
            DnsRecordType::SRV => write!(f, "SRV"),
            DnsRecordType::Other(code) => write!(f, "TYPE{}", code),
        }
    }
}

impl FromStr for DnsRecordType {
    type Err = AgingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        match upper.as_str() {
            "TOMBSTONE" => Ok(DnsRecordType::TOMBSTONE),
            "A" => Ok(DnsRecordType::A),
            "NS" => Ok(DnsRecordType::NS),
            "CNAME" => Ok(DnsRecordType::CNAME),
            "SOA" => Ok(DnsRecordType::SOA),
            "PTR" => Ok(DnsRecordType::PTR),
            "MX" => Ok(DnsRecordType::MX),
            "TXT" => Ok(DnsRecordType::TXT),
            "AAAA" => Ok(DnsRecordType::AAAA),
            "SRV" => Ok(DnsRecordType::SRV),
            _ => upper
                .strip_prefix("TYPE")
                .and_then(|code| code.parse::<u16>().ok())
                .map(DnsRecordType::from_code)
                .ok_or_else(|| AgingError::InvalidRecord(format!("unknown record type: {}", s))),
        }
    }
}

/// A resource record with its aging metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsRecord {
    /// Record type
    pub record_type: DnsRecordType,
    /// Type-specific data, opaque to the engine
    pub data: Vec<u8>,
    /// Time to live in seconds
    pub ttl: u32,
    /// Hours since 1601 when the record was last confirmed; 0 = static
    pub timestamp: DnsTimestamp,
    /// Zone serial at the last write
    pub serial: u32,
    /// Data rank
    pub rank: u8,
    /// Record flags owned by the engine (low byte of the stored field)
    pub flags: u8,
    /// High byte of the stored flags field. Owned by other writers and
    /// carried through untouched.
    #[serde(default)]
    pub foreign_flags: u8,
    /// Reserved field, carried through untouched by administrative edits
    pub reserved: u32,
}

impl DnsRecord {
    /// Create a static, zone-ranked record
    pub fn new(record_type: DnsRecordType, data: impl Into<Vec<u8>>, ttl: u32) -> Self {
        Self {
            record_type,
            data: data.into(),
            ttl,
            timestamp: DnsTimestamp::STATIC,
            serial: 0,
            rank: DNS_RANK_ZONE,
            flags: 0,
            foreign_flags: 0,
            reserved: 0,
        }
    }

    /// Create an A record
    pub fn a(ip: Ipv4Addr, ttl: u32) -> Self {
        Self::new(DnsRecordType::A, ip.octets().to_vec(), ttl)
    }

    /// Create an AAAA record
    pub fn aaaa(ip: Ipv6Addr, ttl: u32) -> Self {
        Self::new(DnsRecordType::AAAA, ip.octets().to_vec(), ttl)
    }

    /// Create a TXT record from a single string
    pub fn txt(text: &str, ttl: u32) -> Self {
        Self::txt_strings(&[text], ttl)
    }

    /// Create a TXT record from a list of character-strings. Strings longer
    /// than 255 bytes are split.
    pub fn txt_strings(strings: &[&str], ttl: u32) -> Self {
        let mut data = Vec::new();
        for s in strings {
            let bytes = s.as_bytes();
            if bytes.is_empty() {
                data.push(0);
                continue;
            }
            for chunk in bytes.chunks(255) {
                data.push(chunk.len() as u8);
                data.extend_from_slice(chunk);
            }
        }
        Self::new(DnsRecordType::TXT, data, ttl)
    }

    /// Create the single record of a tombstoned node
    pub fn tombstone(hours: DnsTimestamp, entombed: NtTime) -> Self {
        Self {
            record_type: DnsRecordType::TOMBSTONE,
            data: entombed.ticks().to_le_bytes().to_vec(),
            ttl: 0,
            timestamp: hours,
            serial: 0,
            rank: 0,
            flags: 0,
            foreign_flags: 0,
            reserved: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DnsTimestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_rank(mut self, rank: u8) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_foreign_flags(mut self, foreign_flags: u8) -> Self {
        self.foreign_flags = foreign_flags;
        self
    }

    pub fn with_reserved(mut self, reserved: u32) -> Self {
        self.reserved = reserved;
        self
    }

    /// Whether `other` is the same record (same type and data)
    pub fn matches(&self, other: &DnsRecord) -> bool {
        self.record_type == other.record_type && self.data == other.data
    }

    pub fn is_static(&self) -> bool {
        self.timestamp.is_static()
    }

    pub fn is_tombstone(&self) -> bool {
        self.record_type == DnsRecordType::TOMBSTONE
    }

    /// Entombment instant carried in a tombstone's data
    pub fn entombed_time(&self) -> Option<NtTime> {
        if !self.is_tombstone() {
            return None;
        }
        let bytes: [u8; 8] = self.data.as_slice().try_into().ok()?;
        Some(NtTime::from_ticks(u64::from_le_bytes(bytes)))
    }

    /// Decode TXT data into its character-strings
    pub fn txt_values(&self) -> Option<Vec<String>> {
        if self.record_type != DnsRecordType::TXT {
            return None;
        }
        let mut values = Vec::new();
        let mut rest = self.data.as_slice();
        while let Some((&len, tail)) = rest.split_first() {
            let len = len as usize;
            if tail.len() < len {
                return None;
            }
            values.push(String::from_utf8_lossy(&tail[..len]).into_owned());
            rest = &tail[len..];
        }
        Some(values)
    }

    /// Format the data for logs
    pub fn data_display(&self) -> String {
        match self.record_type {
            DnsRecordType::A if self.data.len() == 4 => {
                Ipv4Addr::new(self.data[0], self.data[1], self.data[2], self.data[3]).to_string()
            }
            DnsRecordType::AAAA if self.data.len() == 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&self.data);
                Ipv6Addr::from(octets).to_string()
            }
            DnsRecordType::TXT => match self.txt_values() {
                Some(values) => values
                    .iter()
                    .map(|v| format!("\"{}\"", v))
                    .collect::<Vec<_>>()
                    .join(" "),
                None => hex::encode(&self.data),
            },
            DnsRecordType::TOMBSTONE => match self.entombed_time() {
                Some(t) => format!("entombed@{}", t),
                None => hex::encode(&self.data),
            },
            _ => hex::encode(&self.data),
        }
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ttl={} ts={} serial={}",
            self.record_type,
            self.data_display(),
            self.ttl,
            self.timestamp,
            self.serial
        )
    }
}

/// Identity of a node: owner name within a zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    /// Zone the node belongs to (e.g. "example.com")
    pub zone: String,
    /// Owner name relative to the zone ("@" for the apex)
    pub name: String,
}

impl NodeKey {
    pub fn new(zone: &str, name: &str) -> Self {
        let name = normalize_domain(name);
        Self {
            zone: normalize_domain(zone),
            name: if name.is_empty() { "@".to_string() } else { name },
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == "@" {
            write!(f, "{}", self.zone)
        } else {
            write!(f, "{}.{}", self.name, self.zone)
        }
    }
}

/// A DNS node: every record at one owner name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsNode {
    pub key: NodeKey,
    /// Live records, or exactly one TOMBSTONE record when tombstoned
    pub records: Vec<DnsRecord>,
    pub tombstoned: bool,
}

impl DnsNode {
    /// Create an empty live node
    pub fn new(key: NodeKey) -> Self {
        Self {
            key,
            records: Vec::new(),
            tombstoned: false,
        }
    }

    pub fn with_records(key: NodeKey, records: Vec<DnsRecord>) -> Self {
        Self {
            key,
            records,
            tombstoned: false,
        }
    }

    /// Index of the record matching `record`
    pub fn position(&self, record: &DnsRecord) -> Option<usize> {
        self.records.iter().position(|r| r.matches(record))
    }

    /// Find the record matching `record`
    pub fn find(&self, record: &DnsRecord) -> Option<&DnsRecord> {
        self.records.iter().find(|r| r.matches(record))
    }

    /// Whether any live record is static
    pub fn has_static_record(&self) -> bool {
        !self.tombstoned && self.records.iter().any(|r| r.is_static())
    }

    /// Highest serial among the node's records
    pub fn max_serial(&self) -> u32 {
        self.records.iter().map(|r| r.serial).max().unwrap_or(0)
    }

    /// Entombment instant of a tombstoned node
    pub fn entombed_time(&self) -> Option<NtTime> {
        if !self.tombstoned {
            return None;
        }
        self.records.iter().find_map(|r| r.entombed_time())
    }

    /// Hour timestamp of a tombstoned node's tombstone record
    pub fn tombstone_timestamp(&self) -> Option<DnsTimestamp> {
        if !self.tombstoned {
            return None;
        }
        self.records
            .iter()
            .find(|r| r.is_tombstone())
            .map(|r| r.timestamp)
    }
}

/// Source of an inbound write; selects the timestamp policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    /// DNS protocol dynamic update
    DynamicUpdate,
    /// Management-plane record add/replace
    ManagementUpdate,
    /// Direct edit of the stored record, applied verbatim
    AdministrativeEdit,
}

impl fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateSource::DynamicUpdate => write!(f, "dynamic-update"),
            UpdateSource::ManagementUpdate => write!(f, "management-update"),
            UpdateSource::AdministrativeEdit => write!(f, "administrative-edit"),
        }
    }
}

/// Normalize a domain name (lowercase, remove trailing dot)
pub fn normalize_domain(domain: &str) -> String {
    domain.to_lowercase().trim_end_matches('.').to_string()
}

/// Aging engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgingError {
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

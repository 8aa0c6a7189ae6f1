//! Persisted Record Layout
//!
//! Fixed 24-byte header followed by the type-specific data:
//!
//! ```text
//! 0      2      4   5   6      8        12       16        20         24
//! +------+------+---+---+------+--------+--------+---------+----------+------
//! | dlen | type |ver|rnk| flags| serial |  ttl   |reserved |timestamp | data
//! |  LE  |  LE  |   |   |  LE  |   LE   |   BE   |   LE    |    LE    |
//! +------+------+---+---+------+--------+--------+---------+----------+------
//! ```
//!
//! The engine owns the low byte of `flags`. The high byte belongs to other
//! writers and is kept in `foreign_flags` so it survives a rewrite.

use super::{AgingError, DnsRecord, DnsRecordType, DnsTimestamp, DNS_RECORD_VERSION};

/// Size of the fixed header
pub const RECORD_HEADER_LEN: usize = 24;

/// Encode a record into its persisted layout
pub fn encode_record(record: &DnsRecord) -> Result<Vec<u8>, AgingError> {
    let data_len = u16::try_from(record.data.len()).map_err(|_| {
        AgingError::InvalidRecord(format!(
            "record data too long: {} bytes",
            record.data.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(RECORD_HEADER_LEN + record.data.len());
    buf.extend_from_slice(&data_len.to_le_bytes());
    buf.extend_from_slice(&record.record_type.code().to_le_bytes());
    buf.push(DNS_RECORD_VERSION);
    buf.push(record.rank);
    buf.extend_from_slice(&[record.flags, record.foreign_flags]);
    buf.extend_from_slice(&record.serial.to_le_bytes());
    buf.extend_from_slice(&record.ttl.to_be_bytes());
    buf.extend_from_slice(&record.reserved.to_le_bytes());
    buf.extend_from_slice(&record.timestamp.hours().to_le_bytes());
    buf.extend_from_slice(&record.data);
    Ok(buf)
}

/// Decode a record from its persisted layout
pub fn decode_record(buf: &[u8]) -> Result<DnsRecord, AgingError> {
    if buf.len() < RECORD_HEADER_LEN {
        return Err(AgingError::InvalidRecord(format!(
            "record too short: {} bytes",
            buf.len()
        )));
    }

    let data_len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    if buf.len() != RECORD_HEADER_LEN + data_len {
        return Err(AgingError::InvalidRecord(format!(
            "data length {} does not match buffer of {} bytes",
            data_len,
            buf.len()
        )));
    }

    let version = buf[4];
    if version != DNS_RECORD_VERSION {
        return Err(AgingError::InvalidRecord(format!(
            "unsupported record version {}",
            version
        )));
    }

    Ok(DnsRecord {
        record_type: DnsRecordType::from_code(u16::from_le_bytes([buf[2], buf[3]])),
        rank: buf[5],
        flags: buf[6],
        foreign_flags: buf[7],
        serial: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        ttl: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        reserved: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        timestamp: DnsTimestamp::from_hours(u32::from_le_bytes([
            buf[20], buf[21], buf[22], buf[23],
        ])),
        data: buf[RECORD_HEADER_LEN..].to_vec(),
    })
}

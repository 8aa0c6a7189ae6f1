//! Fuzz target for the persisted record decoder
//!
//! Any buffer the decoder accepts must encode back to the same bytes.
//!
//! Run with: cargo +nightly fuzz run fuzz_record_codec

#![no_main]

use dns_aging::dns::{decode_record, encode_record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = decode_record(data) {
        let encoded = encode_record(&record).expect("decoded record must re-encode");
        assert_eq!(encoded, data);
        let _ = record.data_display();
        let _ = record.entombed_time();
    }
});

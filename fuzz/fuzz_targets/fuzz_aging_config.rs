//! Fuzz target for the aging configuration parsers
//!
//! Run with: cargo +nightly fuzz run fuzz_aging_config

#![no_main]

use dns_aging::dns::AgingConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config_str) = std::str::from_utf8(data) {
        if let Ok(config) = AgingConfig::from_toml(config_str) {
            if config.validate().is_ok() {
                // a valid config survives serialization
                let toml = config.to_toml().expect("valid config must serialize");
                let _ = AgingConfig::from_toml(&toml).expect("serialized config must parse");
            }
        }

        if let Ok(config) = AgingConfig::from_yaml(config_str) {
            let _ = config.validate();
        }
    }
});

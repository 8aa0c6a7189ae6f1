//! Aging Configuration
//!
//! Per-zone aging windows plus the engine-wide settings for tombstone
//! lifetime, commit retries, the periodic sweep and node storage.

use serde::{Deserialize, Serialize};

use super::AgingError;

/// Default no-refresh window (7 days)
pub const DEFAULT_NO_REFRESH_HOURS: u32 = 168;

/// Default refresh window (7 days)
pub const DEFAULT_REFRESH_HOURS: u32 = 168;

/// Default tombstone lifetime before a tombstoned node is purged (14 days)
pub const DEFAULT_TOMBSTONE_LIFETIME_HOURS: u32 = 336;

/// Default number of retries after a lost per-node commit race
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 5;

/// Aging settings owned by a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneAgingConfig {
    /// Whether aging and scavenging apply to the zone
    pub enabled: bool,
    /// Hours after a refresh during which updates leave the timestamp alone
    pub no_refresh_hours: u32,
    /// Hours after the no-refresh window during which a record may still be
    /// refreshed before it becomes eligible for scavenging
    pub refresh_hours: u32,
}

impl Default for ZoneAgingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            no_refresh_hours: DEFAULT_NO_REFRESH_HOURS,
            refresh_hours: DEFAULT_REFRESH_HOURS,
        }
    }
}

impl ZoneAgingConfig {
    pub fn new(enabled: bool, no_refresh_hours: u32, refresh_hours: u32) -> Self {
        Self {
            enabled,
            no_refresh_hours,
            refresh_hours,
        }
    }

    /// Default windows with aging switched on
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Age in hours a record must exceed before it can be scavenged
    pub fn scavenge_after_hours(&self) -> u64 {
        self.no_refresh_hours as u64 + self.refresh_hours as u64
    }

    pub fn validate(&self) -> Result<(), AgingError> {
        if self.no_refresh_hours == 0 {
            return Err(AgingError::InvalidConfiguration(
                "no_refresh_hours must be > 0".to_string(),
            ));
        }
        if self.refresh_hours == 0 {
            return Err(AgingError::InvalidConfiguration(
                "refresh_hours must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A zone declared in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEntry {
    /// Zone name (e.g. "example.com")
    pub name: String,
    /// Aging settings; omitted fields fall back to the defaults
    #[serde(default)]
    pub aging: ZoneAgingConfig,
}

/// Periodic sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Run the sweep on a timer
    pub enabled: bool,
    /// Seconds between sweeps
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
        }
    }
}

/// Node storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path for node persistence
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./dns-aging.db".to_string(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgingConfig {
    /// Hours a tombstone is kept before the node is deleted
    pub tombstone_lifetime_hours: u32,
    /// Retries after a lost per-node commit race before giving up
    pub max_commit_retries: u32,
    /// Aging settings for zones registered without explicit settings
    pub default_zone: ZoneAgingConfig,
    /// Zones registered at startup
    pub zones: Vec<ZoneEntry>,
    /// Periodic sweep settings
    pub sweep: SweepConfig,
    /// Node storage settings
    pub storage: StorageConfig,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            tombstone_lifetime_hours: DEFAULT_TOMBSTONE_LIFETIME_HOURS,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
            default_zone: ZoneAgingConfig::default(),
            zones: Vec::new(),
            sweep: SweepConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AgingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AgingError> {
        if self.tombstone_lifetime_hours == 0 {
            return Err(AgingError::InvalidConfiguration(
                "tombstone_lifetime_hours must be > 0".to_string(),
            ));
        }

        if self.sweep.enabled && self.sweep.interval_secs == 0 {
            return Err(AgingError::InvalidConfiguration(
                "sweep.interval_secs must be > 0".to_string(),
            ));
        }

        self.default_zone.validate()?;

        let mut seen = std::collections::HashSet::new();
        for zone in &self.zones {
            let name = super::normalize_domain(&zone.name);
            if name.is_empty() {
                return Err(AgingError::InvalidConfiguration(
                    "zone name must not be empty".to_string(),
                ));
            }
            if !seen.insert(name) {
                return Err(AgingError::InvalidConfiguration(format!(
                    "zone {} declared twice",
                    zone.name
                )));
            }
            zone.aging.validate().map_err(|e| {
                AgingError::InvalidConfiguration(format!("zone {}: {}", zone.name, e))
            })?;
        }

        Ok(())
    }

    /// Load configuration from TOML
    pub fn from_toml(content: &str) -> Result<Self, AgingError> {
        toml::from_str(content)
            .map_err(|e| AgingError::InvalidConfiguration(format!("TOML parse error: {}", e)))
    }

    /// Load configuration from YAML
    pub fn from_yaml(content: &str) -> Result<Self, AgingError> {
        serde_yaml::from_str(content)
            .map_err(|e| AgingError::InvalidConfiguration(format!("YAML parse error: {}", e)))
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, AgingError> {
        toml::to_string_pretty(self)
            .map_err(|e| AgingError::InvalidConfiguration(format!("TOML serialize error: {}", e)))
    }
}

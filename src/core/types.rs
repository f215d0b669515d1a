use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// 64-bit extended unique identifier of an end-device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DevEui(
    #[serde(serialize_with = "super::serde::serialize_eui")]
    #[serde(deserialize_with = "super::serde::deserialize_eui")]
    pub [u8; 8],
);

impl DevEui {
    /// Returns the raw bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for DevEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for DevEui {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut eui = [0u8; 8];
        hex::decode_to_slice(s.trim(), &mut eui)
            .map_err(|e| Error::config(format!("Invalid DevEUI '{}': {}", s, e)))?;
        Ok(DevEui(eui))
    }
}

/// Duration in protobuf representation, as carried by gateway receive metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtoDuration {
    /// Whole seconds
    pub seconds: i64,
    /// Nanosecond fraction, same sign as `seconds`
    pub nanos: i32,
}

/// Timestamp in protobuf representation (seconds since the Unix epoch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtoTimestamp {
    /// Seconds since 1970-01-01T00:00:00Z
    pub seconds: i64,
    /// Non-negative nanosecond fraction
    pub nanos: i32,
}

/// Receive-path metadata of a single gateway that heard the uplink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RxInfo {
    /// Gateway receive time expressed as time since the GPS epoch
    pub time_since_gps_epoch: Option<ProtoDuration>,
    /// Gateway receive time as wall-clock timestamp
    pub time: Option<ProtoTimestamp>,
}

/// Uplink event as delivered by the integration layer
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkEvent {
    /// Device that sent the uplink
    pub dev_eui: DevEui,
    /// Application port
    pub f_port: u8,
    /// Decrypted application payload
    pub data: Bytes,
    /// Receive metadata, one entry per gateway
    pub rx_info: Vec<RxInfo>,
}

/// Item to enqueue for downlink transmission to a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceQueueItem {
    /// Target device
    pub dev_eui: DevEui,
    /// Application port
    pub f_port: u8,
    /// Application payload
    pub data: Bytes,
}

/// Configuration of the clock sync handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSyncConfig {
    /// Application port the clock sync package listens on
    pub f_port: u8,
    /// Drift (seconds) below which an unrequested answer is suppressed
    pub suppression_threshold: u32,
    /// SQLite file for the device ledger; in-memory ledger when unset
    #[serde(deserialize_with = "super::serde::deserialize_opt_path")]
    pub database_path: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Capacity of the downlink and uplink channels
    pub downlink_buffer: usize,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        ClockSyncConfig {
            f_port: super::DEFAULT_FPORT,
            suppression_threshold: super::DEFAULT_SUPPRESSION_THRESHOLD,
            database_path: None,
            log_filter: "info".to_string(),
            downlink_buffer: 64,
        }
    }
}

impl ClockSyncConfig {
    /// Parses and validates a TOML configuration
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ClockSyncConfig =
            toml::from_str(s).map_err(|e| Error::config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.f_port == 0 || self.f_port > super::MAX_APPLICATION_FPORT {
            return Err(Error::config(format!(
                "f_port must be within 1..={}, got {}",
                super::MAX_APPLICATION_FPORT,
                self.f_port
            )));
        }

        if self.suppression_threshold > i32::MAX as u32 {
            return Err(Error::config("suppression_threshold does not fit a time correction"));
        }

        if self.downlink_buffer == 0 {
            return Err(Error::config("downlink_buffer must be greater than zero"));
        }

        if self.log_filter.trim().is_empty() {
            return Err(Error::config("log_filter must not be empty"));
        }

        Ok(())
    }
}

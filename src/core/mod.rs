//! Core types shared by the clock sync handler
//!
//! This module contains the error type, identifiers, event types and
//! configuration used throughout the library.

pub mod error;
pub mod serde;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{
    ClockSyncConfig,
    DevEui,
    DeviceQueueItem,
    ProtoDuration,
    ProtoTimestamp,
    RxInfo,
    UplinkEvent,
};

/// Default application port of the clock synchronization package
pub const DEFAULT_FPORT: u8 = 202;

/// Highest application port usable by application payloads
pub const MAX_APPLICATION_FPORT: u8 = 223;

/// Drift (seconds) under which an unrequested correction is not sent
pub const DEFAULT_SUPPRESSION_THRESHOLD: u32 = 5;

//! Clock synchronization command set
//!
//! This module defines the commands of the LoRaWAN Application Layer Clock
//! Synchronization package and their bit-exact wire encoding.

pub mod codec;
pub mod command;

pub use self::codec::{decode_all, decode_downlink, decode_uplink, ClockSyncCodec};
pub use self::command::{AppTimeAns, AppTimeReq, Cid, ClockSyncCommand, Direction};

/// Largest encoded command (CID plus a five byte payload)
pub const MAX_COMMAND_SIZE: usize = 6;

/// Package identifier reported in PackageVersionAns
pub const PACKAGE_IDENTIFIER: u8 = 1;

/// Package version implemented by this handler
pub const PACKAGE_VERSION: u8 = 1;

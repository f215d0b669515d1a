use std::fmt;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;

use super::codec::ClockSyncCodec;
use crate::core::{Error, Result};

/// Command identifier, the first byte of every clock sync command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cid {
    /// PackageVersionReq / PackageVersionAns
    PackageVersion = 0x00,
    /// AppTimeReq / AppTimeAns
    AppTime = 0x01,
    /// DeviceAppTimePeriodicityReq / DeviceAppTimePeriodicityAns
    DeviceAppTimePeriodicity = 0x02,
    /// ForceDeviceResyncReq
    ForceDeviceResync = 0x03,
}

impl TryFrom<u8> for Cid {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(Cid::PackageVersion),
            0x01 => Ok(Cid::AppTime),
            0x02 => Ok(Cid::DeviceAppTimePeriodicity),
            0x03 => Ok(Cid::ForceDeviceResync),
            other => Err(Error::decode(format!("unknown CID: {:#04x}", other))),
        }
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cid::PackageVersion => "PackageVersion",
            Cid::AppTime => "AppTime",
            Cid::DeviceAppTimePeriodicity => "DeviceAppTimePeriodicity",
            Cid::ForceDeviceResync => "ForceDeviceResync",
        };
        f.write_str(name)
    }
}

/// Direction a command travels in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to network
    Uplink,
    /// Network to device
    Downlink,
}

/// Device clock report (uplink)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppTimeReq {
    /// Device clock, seconds since the GPS epoch modulo 2^32
    pub device_time: u32,
    /// Device asks for an answer even when its clock is accurate
    pub ans_required: bool,
    /// Request token, 4 bits
    pub token_req: u8,
}

/// Clock correction (downlink)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppTimeAns {
    /// Seconds to add to the device clock
    pub time_correction: i32,
    /// Echo of the request token, 4 bits
    pub token_ans: u8,
}

/// A command of the LoRaWAN Application Layer Clock Synchronization package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSyncCommand {
    /// Asks the device for the package version (downlink)
    PackageVersionReq,
    /// Package identifier and version implemented by the device (uplink)
    PackageVersionAns {
        /// Package identifier, 1 for clock synchronization
        package_identifier: u8,
        /// Package version
        package_version: u8,
    },
    /// Device clock report (uplink)
    AppTimeReq(AppTimeReq),
    /// Clock correction (downlink)
    AppTimeAns(AppTimeAns),
    /// Sets the periodicity of device clock reports (downlink)
    DeviceAppTimePeriodicityReq {
        /// Report every 128 * 2^periodicity seconds, 4 bits
        periodicity: u8,
    },
    /// Periodicity acknowledgement with the current device time (uplink)
    DeviceAppTimePeriodicityAns {
        /// Device does not support the requested periodicity
        not_supported: bool,
        /// Device clock at the time of the answer
        time: u32,
    },
    /// Asks the device to send clock reports right away (downlink)
    ForceDeviceResyncReq {
        /// Number of AppTimeReq transmissions, 3 bits
        nb_transmissions: u8,
    },
}

impl ClockSyncCommand {
    /// Returns the command identifier
    pub fn cid(&self) -> Cid {
        match self {
            ClockSyncCommand::PackageVersionReq | ClockSyncCommand::PackageVersionAns { .. } => {
                Cid::PackageVersion
            }
            ClockSyncCommand::AppTimeReq(_) | ClockSyncCommand::AppTimeAns(_) => Cid::AppTime,
            ClockSyncCommand::DeviceAppTimePeriodicityReq { .. }
            | ClockSyncCommand::DeviceAppTimePeriodicityAns { .. } => {
                Cid::DeviceAppTimePeriodicity
            }
            ClockSyncCommand::ForceDeviceResyncReq { .. } => Cid::ForceDeviceResync,
        }
    }

    /// Returns the direction the command travels in
    pub fn direction(&self) -> Direction {
        match self {
            ClockSyncCommand::PackageVersionAns { .. }
            | ClockSyncCommand::AppTimeReq(_)
            | ClockSyncCommand::DeviceAppTimePeriodicityAns { .. } => Direction::Uplink,
            ClockSyncCommand::PackageVersionReq
            | ClockSyncCommand::AppTimeAns(_)
            | ClockSyncCommand::DeviceAppTimePeriodicityReq { .. }
            | ClockSyncCommand::ForceDeviceResyncReq { .. } => Direction::Downlink,
        }
    }

    /// Returns the AppTimeReq payload of an uplink AppTime command
    ///
    /// Any other variant carrying the AppTime identifier violates the
    /// uplink contract.
    pub fn into_app_time_req(self) -> Result<AppTimeReq> {
        match self {
            ClockSyncCommand::AppTimeReq(req) => Ok(req),
            other => Err(Error::contract_violation(format!(
                "expected AppTimeReq for CID {}, got: {:?}",
                Cid::AppTime,
                other
            ))),
        }
    }

    /// Encodes the command in its own direction
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut codec = ClockSyncCodec::new(self.direction());
        let mut buf = BytesMut::with_capacity(super::MAX_COMMAND_SIZE);
        codec.encode(*self, &mut buf)?;
        Ok(buf.freeze())
    }
}

impl From<AppTimeReq> for ClockSyncCommand {
    fn from(req: AppTimeReq) -> Self {
        ClockSyncCommand::AppTimeReq(req)
    }
}

impl From<AppTimeAns> for ClockSyncCommand {
    fn from(ans: AppTimeAns) -> Self {
        ClockSyncCommand::AppTimeAns(ans)
    }
}

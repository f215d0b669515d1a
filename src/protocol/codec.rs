use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::command::{AppTimeAns, AppTimeReq, Cid, ClockSyncCommand, Direction};
use crate::core::{Error, Result};

const TOKEN_MASK: u8 = 0x0f;
const ANS_REQUIRED_BIT: u8 = 0x10;
const NOT_SUPPORTED_BIT: u8 = 0x01;
const NB_TRANSMISSIONS_MASK: u8 = 0x07;

/// Codec for clock sync commands travelling in one direction
///
/// A command identifier is shared by the uplink and the downlink variant of
/// a command, so the direction selects the payload layout. All multi-byte
/// fields are little-endian.
///
/// LoRaWAN payloads arrive whole: a command shorter than its fixed layout is
/// malformed rather than pending, and decoding reports it as an error
/// without consuming any input.
#[derive(Debug, Clone, Copy)]
pub struct ClockSyncCodec {
    direction: Direction,
}

impl ClockSyncCodec {
    /// Creates a codec for the given direction
    pub fn new(direction: Direction) -> Self {
        ClockSyncCodec { direction }
    }

    /// Codec for device to network commands
    pub fn uplink() -> Self {
        Self::new(Direction::Uplink)
    }

    /// Codec for network to device commands
    pub fn downlink() -> Self {
        Self::new(Direction::Downlink)
    }

    /// Returns the payload size for a command identifier in this direction
    fn payload_size(&self, cid: Cid) -> Result<usize> {
        match (self.direction, cid) {
            (Direction::Uplink, Cid::PackageVersion) => Ok(2),
            (Direction::Uplink, Cid::AppTime) => Ok(5),
            (Direction::Uplink, Cid::DeviceAppTimePeriodicity) => Ok(5),
            (Direction::Downlink, Cid::PackageVersion) => Ok(0),
            (Direction::Downlink, Cid::AppTime) => Ok(5),
            (Direction::Downlink, Cid::DeviceAppTimePeriodicity) => Ok(1),
            (Direction::Downlink, Cid::ForceDeviceResync) => Ok(1),
            (Direction::Uplink, Cid::ForceDeviceResync) => Err(Error::decode(format!(
                "payload unknown for uplink CID {}",
                cid
            ))),
        }
    }
}

impl Decoder for ClockSyncCodec {
    type Item = ClockSyncCommand;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        let cid = Cid::try_from(src[0])?;
        let size = self.payload_size(cid)?;
        if src.len() < 1 + size {
            return Err(Error::decode(format!(
                "{} expects {} payload bytes, got {}",
                cid,
                size,
                src.len() - 1
            )));
        }

        src.advance(1);
        let mut payload = src.split_to(size);

        let command = match (self.direction, cid) {
            (Direction::Uplink, Cid::PackageVersion) => ClockSyncCommand::PackageVersionAns {
                package_identifier: payload.get_u8(),
                package_version: payload.get_u8(),
            },
            (Direction::Uplink, Cid::AppTime) => {
                let device_time = payload.get_u32_le();
                let param = payload.get_u8();
                ClockSyncCommand::AppTimeReq(AppTimeReq {
                    device_time,
                    ans_required: param & ANS_REQUIRED_BIT != 0,
                    token_req: param & TOKEN_MASK,
                })
            }
            (Direction::Uplink, Cid::DeviceAppTimePeriodicity) => {
                let status = payload.get_u8();
                ClockSyncCommand::DeviceAppTimePeriodicityAns {
                    not_supported: status & NOT_SUPPORTED_BIT != 0,
                    time: payload.get_u32_le(),
                }
            }
            (Direction::Downlink, Cid::PackageVersion) => ClockSyncCommand::PackageVersionReq,
            (Direction::Downlink, Cid::AppTime) => {
                let time_correction = payload.get_i32_le();
                let param = payload.get_u8();
                ClockSyncCommand::AppTimeAns(AppTimeAns {
                    time_correction,
                    token_ans: param & TOKEN_MASK,
                })
            }
            (Direction::Downlink, Cid::DeviceAppTimePeriodicity) => {
                ClockSyncCommand::DeviceAppTimePeriodicityReq {
                    periodicity: payload.get_u8() & TOKEN_MASK,
                }
            }
            (Direction::Downlink, Cid::ForceDeviceResync) => {
                ClockSyncCommand::ForceDeviceResyncReq {
                    nb_transmissions: payload.get_u8() & NB_TRANSMISSIONS_MASK,
                }
            }
            (Direction::Uplink, Cid::ForceDeviceResync) => {
                return Err(Error::decode("ForceDeviceResync is not an uplink command"));
            }
        };

        Ok(Some(command))
    }
}

fn check_max(field: &str, value: u8, max: u8) -> Result<()> {
    if value > max {
        return Err(Error::encode(format!(
            "max value of {} is {}, got {}",
            field, max, value
        )));
    }
    Ok(())
}

impl Encoder<ClockSyncCommand> for ClockSyncCodec {
    type Error = Error;

    fn encode(&mut self, item: ClockSyncCommand, dst: &mut BytesMut) -> Result<()> {
        if item.direction() != self.direction {
            return Err(Error::encode(format!(
                "{:?} command {} cannot be encoded as {:?}",
                item.direction(),
                item.cid(),
                self.direction
            )));
        }

        // Validate before writing so a failure leaves `dst` untouched
        match item {
            ClockSyncCommand::AppTimeReq(req) => check_max("TokenReq", req.token_req, TOKEN_MASK)?,
            ClockSyncCommand::AppTimeAns(ans) => check_max("TokenAns", ans.token_ans, TOKEN_MASK)?,
            ClockSyncCommand::DeviceAppTimePeriodicityReq { periodicity } => {
                check_max("Periodicity", periodicity, TOKEN_MASK)?
            }
            ClockSyncCommand::ForceDeviceResyncReq { nb_transmissions } => {
                check_max("NbTransmissions", nb_transmissions, NB_TRANSMISSIONS_MASK)?
            }
            _ => {}
        }

        dst.reserve(1 + self.payload_size(item.cid())?);
        dst.put_u8(item.cid() as u8);

        match item {
            ClockSyncCommand::PackageVersionReq => {}
            ClockSyncCommand::PackageVersionAns {
                package_identifier,
                package_version,
            } => {
                dst.put_u8(package_identifier);
                dst.put_u8(package_version);
            }
            ClockSyncCommand::AppTimeReq(req) => {
                dst.put_u32_le(req.device_time);
                let mut param = req.token_req;
                if req.ans_required {
                    param |= ANS_REQUIRED_BIT;
                }
                dst.put_u8(param);
            }
            ClockSyncCommand::AppTimeAns(ans) => {
                dst.put_i32_le(ans.time_correction);
                dst.put_u8(ans.token_ans);
            }
            ClockSyncCommand::DeviceAppTimePeriodicityReq { periodicity } => {
                dst.put_u8(periodicity);
            }
            ClockSyncCommand::DeviceAppTimePeriodicityAns {
                not_supported,
                time,
            } => {
                dst.put_u8(if not_supported { NOT_SUPPORTED_BIT } else { 0 });
                dst.put_u32_le(time);
            }
            ClockSyncCommand::ForceDeviceResyncReq { nb_transmissions } => {
                dst.put_u8(nb_transmissions);
            }
        }

        Ok(())
    }
}

fn decode_first(direction: Direction, data: &[u8]) -> Result<ClockSyncCommand> {
    if data.is_empty() {
        return Err(Error::decode("at least 1 byte is expected"));
    }

    let mut buf = BytesMut::from(data);
    ClockSyncCodec::new(direction)
        .decode(&mut buf)?
        .ok_or_else(|| Error::decode("at least 1 byte is expected"))
}

/// Decodes the first command of an uplink payload
///
/// Bytes following the first command are ignored.
pub fn decode_uplink(data: &[u8]) -> Result<ClockSyncCommand> {
    decode_first(Direction::Uplink, data)
}

/// Decodes the first command of a downlink payload
pub fn decode_downlink(data: &[u8]) -> Result<ClockSyncCommand> {
    decode_first(Direction::Downlink, data)
}

/// Decodes every command of a payload carrying several concatenated commands
pub fn decode_all(direction: Direction, data: &[u8]) -> Result<Vec<ClockSyncCommand>> {
    let mut codec = ClockSyncCodec::new(direction);
    let mut buf = BytesMut::from(data);
    let mut commands = Vec::new();
    while let Some(command) = codec.decode(&mut buf)? {
        commands.push(command);
    }
    Ok(commands)
}

//! Reference time management
//!
//! This module derives the network reference time of an uplink, expressed as
//! time since the GPS epoch, from the receive metadata reported by the
//! gateways that heard it.
//!
//! Sources are tried in order of precision:
//!
//! 1. A gateway-reported time since GPS epoch (fine timestamping gateways)
//! 2. A gateway-reported wall-clock receive time
//! 3. The local [`Clock`]
//!
//! Resolution never fails; a malformed record is logged and skipped.
//!
//! # Examples
//!
//! ```
//! use lora_clocksync::core::{ProtoDuration, RxInfo};
//! use lora_clocksync::time::{resolve_rx_gps_time, SystemClock};
//! use std::time::Duration;
//!
//! let rx_info = vec![RxInfo {
//!     time_since_gps_epoch: Some(ProtoDuration { seconds: 1_300_000_000, nanos: 0 }),
//!     time: None,
//! }];
//!
//! let gps_time = resolve_rx_gps_time(&rx_info, &SystemClock);
//! assert_eq!(gps_time, Duration::from_secs(1_300_000_000));
//! ```

pub mod gps;
mod source;

pub use self::gps::{time_from_gps_epoch, time_since_gps_epoch};
pub use self::source::{Clock, FixedClock, SystemClock};

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::core::{Error, ProtoDuration, ProtoTimestamp, Result, RxInfo};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Earliest timestamp accepted on the wire (0001-01-01T00:00:00Z)
const MIN_TIMESTAMP_SECS: i64 = -62_135_596_800;

/// Latest timestamp accepted on the wire (9999-12-31T23:59:59Z)
const MAX_TIMESTAMP_SECS: i64 = 253_402_300_799;

impl TryFrom<ProtoDuration> for Duration {
    type Error = Error;

    fn try_from(d: ProtoDuration) -> Result<Self> {
        let nanos = i64::from(d.nanos);
        if nanos <= -NANOS_PER_SEC || nanos >= NANOS_PER_SEC {
            return Err(Error::timing(format!("duration nanos out of range: {}", d.nanos)));
        }
        if (d.seconds < 0 && nanos > 0) || (d.seconds > 0 && nanos < 0) {
            return Err(Error::timing(format!(
                "duration has mismatched signs: {}s {}ns",
                d.seconds, d.nanos
            )));
        }
        if d.seconds < 0 || nanos < 0 {
            return Err(Error::timing(format!(
                "negative duration: {}s {}ns",
                d.seconds, d.nanos
            )));
        }
        if d.seconds > i64::MAX / NANOS_PER_SEC {
            return Err(Error::timing(format!("duration out of range: {}s", d.seconds)));
        }

        Ok(Duration::new(d.seconds as u64, d.nanos as u32))
    }
}

impl TryFrom<ProtoTimestamp> for DateTime<Utc> {
    type Error = Error;

    fn try_from(ts: ProtoTimestamp) -> Result<Self> {
        if !(MIN_TIMESTAMP_SECS..=MAX_TIMESTAMP_SECS).contains(&ts.seconds) {
            return Err(Error::timing(format!("timestamp out of range: {}s", ts.seconds)));
        }
        if ts.nanos < 0 || i64::from(ts.nanos) >= NANOS_PER_SEC {
            return Err(Error::timing(format!("timestamp nanos out of range: {}", ts.nanos)));
        }

        DateTime::from_timestamp(ts.seconds, ts.nanos as u32)
            .ok_or_else(|| Error::timing(format!("invalid timestamp: {}s", ts.seconds)))
    }
}

/// Resolves the GPS time at which an uplink was received
///
/// Returns the first usable (non-zero) gateway time since GPS epoch, else the
/// first usable gateway receive timestamp converted to GPS time, else the
/// current time of `clock` converted to GPS time.
pub fn resolve_rx_gps_time(rx_info: &[RxInfo], clock: &dyn Clock) -> Duration {
    let mut fallback: Option<DateTime<Utc>> = None;

    for rx in rx_info {
        if let Some(since_epoch) = rx.time_since_gps_epoch {
            match Duration::try_from(since_epoch) {
                Ok(d) if !d.is_zero() => return d,
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "clocksync: time since gps epoch to duration error");
                    continue;
                }
            }
        }

        if fallback.is_none() {
            if let Some(ts) = rx.time {
                match DateTime::<Utc>::try_from(ts) {
                    Ok(t) => fallback = Some(t),
                    Err(e) => error!(error = %e, "clocksync: time to timestamp error"),
                }
            }
        }
    }

    if let Some(t) = fallback {
        match time_since_gps_epoch(t) {
            Ok(d) => return d,
            Err(e) => error!(error = %e, "clocksync: rx time to gps time error"),
        }
    }

    debug!("clocksync: no gateway receive time, using local clock");
    let now = clock.now();
    time_since_gps_epoch(now).unwrap_or_else(|e| {
        error!(error = %e, "clocksync: local clock is before the gps epoch");
        Duration::ZERO
    })
}

/// Truncates a GPS time to the 32-bit seconds field used on the wire
pub fn gps_seconds_u32(gps_time: Duration) -> u32 {
    (gps_time.as_secs() & 0xffff_ffff) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gps_rx(seconds: i64, nanos: i32) -> RxInfo {
        RxInfo {
            time_since_gps_epoch: Some(ProtoDuration { seconds, nanos }),
            time: None,
        }
    }

    fn time_rx(t: DateTime<Utc>) -> RxInfo {
        RxInfo {
            time_since_gps_epoch: None,
            time: Some(ProtoTimestamp {
                seconds: t.timestamp(),
                nanos: t.timestamp_subsec_nanos() as i32,
            }),
        }
    }

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_prefers_time_since_gps_epoch() {
        let rx_info = vec![
            time_rx(Utc.with_ymd_and_hms(2010, 1, 28, 16, 36, 24).unwrap()),
            gps_rx(1_000, 500),
            gps_rx(2_000, 0),
        ];

        let d = resolve_rx_gps_time(&rx_info, &clock());
        assert_eq!(d, Duration::new(1_000, 500));
    }

    #[test]
    fn test_falls_back_to_rx_time() {
        let rx_info = vec![time_rx(Utc.with_ymd_and_hms(2010, 1, 28, 16, 36, 24).unwrap())];
        let d = resolve_rx_gps_time(&rx_info, &clock());
        assert_eq!(d, Duration::from_secs(948_731_799));
    }

    #[test]
    fn test_zero_gps_time_is_unusable() {
        let rx_info = vec![
            gps_rx(0, 0),
            time_rx(Utc.with_ymd_and_hms(2010, 1, 28, 16, 36, 24).unwrap()),
        ];
        let d = resolve_rx_gps_time(&rx_info, &clock());
        assert_eq!(d, Duration::from_secs(948_731_799));
    }

    #[test]
    fn test_falls_back_to_clock() {
        let d = resolve_rx_gps_time(&[], &clock());
        assert_eq!(d, Duration::from_secs(1_230_336_018));

        let d = resolve_rx_gps_time(&[RxInfo::default()], &clock());
        assert_eq!(d, Duration::from_secs(1_230_336_018));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let rx_info = vec![
            gps_rx(10, -5),
            gps_rx(-10, 0),
            gps_rx(10, 1_000_000_000),
            RxInfo {
                time_since_gps_epoch: None,
                time: Some(ProtoTimestamp {
                    seconds: MAX_TIMESTAMP_SECS + 1,
                    nanos: 0,
                }),
            },
            gps_rx(42, 0),
        ];

        let d = resolve_rx_gps_time(&rx_info, &clock());
        assert_eq!(d, Duration::from_secs(42));
    }

    #[test]
    fn test_all_malformed_falls_back_to_clock() {
        let rx_info = vec![
            gps_rx(-1, 0),
            RxInfo {
                time_since_gps_epoch: None,
                time: Some(ProtoTimestamp {
                    seconds: 0,
                    nanos: -1,
                }),
            },
        ];

        let d = resolve_rx_gps_time(&rx_info, &clock());
        assert_eq!(d, Duration::from_secs(1_230_336_018));
    }

    #[test]
    fn test_rx_time_before_gps_epoch_falls_back_to_clock() {
        let rx_info = vec![time_rx(Utc.with_ymd_and_hms(1975, 1, 1, 0, 0, 0).unwrap())];
        let d = resolve_rx_gps_time(&rx_info, &clock());
        assert_eq!(d, Duration::from_secs(1_230_336_018));
    }

    #[test]
    fn test_proto_duration_conversion() {
        assert_eq!(
            Duration::try_from(ProtoDuration { seconds: 5, nanos: 250 }).unwrap(),
            Duration::new(5, 250)
        );
        assert!(Duration::try_from(ProtoDuration { seconds: 0, nanos: -1 }).is_err());
        assert!(Duration::try_from(ProtoDuration { seconds: i64::MAX, nanos: 0 }).is_err());
    }

    #[test]
    fn test_gps_seconds_wraps() {
        assert_eq!(gps_seconds_u32(Duration::from_secs(10)), 10);
        assert_eq!(gps_seconds_u32(Duration::from_secs((1 << 32) + 10)), 10);
        assert_eq!(gps_seconds_u32(Duration::new(7, 999_999_999)), 7);
    }
}

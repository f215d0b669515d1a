use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::core::{Error, Result};

/// GPS epoch (1980-01-06T00:00:00Z) in seconds since the Unix epoch
pub const GPS_EPOCH_UNIX_SECS: i64 = 315_964_800;

/// Instants (Unix seconds of the last second of the day) after which a leap
/// second was inserted. GPS time does not observe leap seconds, so every
/// entry before a given UTC instant adds one second to its GPS time.
const LEAP_SECONDS: [i64; 18] = [
    362_793_599,   // 1981-06-30
    394_329_599,   // 1982-06-30
    425_865_599,   // 1983-06-30
    489_023_999,   // 1985-06-30
    567_993_599,   // 1987-12-31
    631_151_999,   // 1989-12-31
    662_687_999,   // 1990-12-31
    709_948_799,   // 1992-06-30
    741_484_799,   // 1993-06-30
    773_020_799,   // 1994-06-30
    820_454_399,   // 1995-12-31
    867_715_199,   // 1997-06-30
    915_148_799,   // 1998-12-31
    1_136_073_599, // 2005-12-31
    1_230_767_999, // 2008-12-31
    1_341_100_799, // 2012-06-30
    1_435_708_799, // 2015-06-30
    1_483_228_799, // 2016-12-31
];

/// Returns the GPS epoch as a UTC timestamp
pub fn gps_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(GPS_EPOCH_UNIX_SECS)
}

/// Number of leap seconds inserted strictly before the given instant
fn leap_seconds_before(t: &DateTime<Utc>) -> i64 {
    let (secs, nanos) = (t.timestamp(), t.timestamp_subsec_nanos());
    LEAP_SECONDS
        .iter()
        .filter(|&&leap| leap < secs || (leap == secs && nanos > 0))
        .count() as i64
}

/// Converts a UTC timestamp into time elapsed since the GPS epoch
///
/// Fails for instants before the GPS epoch, which have no representation.
pub fn time_since_gps_epoch(t: DateTime<Utc>) -> Result<Duration> {
    let elapsed = t.signed_duration_since(gps_epoch()) + TimeDelta::seconds(leap_seconds_before(&t));
    elapsed
        .to_std()
        .map_err(|_| Error::timing(format!("{} is before the GPS epoch", t.to_rfc3339())))
}

/// Converts time elapsed since the GPS epoch back into a UTC timestamp
pub fn time_from_gps_epoch(since_epoch: Duration) -> Result<DateTime<Utc>> {
    let delta = TimeDelta::from_std(since_epoch)
        .map_err(|e| Error::timing(format!("GPS time out of range: {}", e)))?;
    let mut t = gps_epoch()
        .checked_add_signed(delta)
        .ok_or_else(|| Error::timing("GPS time out of range"))?;

    for leap in LEAP_SECONDS {
        if leap < t.timestamp() {
            t -= TimeDelta::seconds(1);
        }
    }

    Ok(t)
}

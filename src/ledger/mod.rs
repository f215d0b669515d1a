//! Device sync ledger
//!
//! Persists, per device, when its clock was last corrected. The ledger is
//! bookkeeping: the reconciliation engine never fails an uplink because of it.

mod memory;
mod sqlite;

pub use self::memory::MemoryLedger;
pub use self::sqlite::SqliteLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::{DevEui, Error, Result};

/// A single device in the clock sync workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClocksyncDevice {
    /// Device identifier, primary key
    pub dev_eui: DevEui,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
    /// Last successful reconciliation, `None` until the first one
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Storage contract for clock sync devices
///
/// Implementations store records as given; timestamps are set by the caller.
#[async_trait]
pub trait DeviceLedger: Send + Sync {
    /// Returns the record for `dev_eui`, or [`Error::NotFound`]
    async fn get(&self, dev_eui: DevEui) -> Result<ClocksyncDevice>;

    /// Inserts a new record; fails if one exists for the same device
    async fn create(&self, device: &ClocksyncDevice) -> Result<()>;

    /// Overwrites `updated_at` and `last_sync_at` of an existing record, or
    /// fails with [`Error::NotFound`]
    async fn update(&self, device: &ClocksyncDevice) -> Result<()>;
}

/// Outcome of recording a reconciliation in the ledger
#[derive(Debug)]
pub enum LedgerUpdate {
    /// First reconciliation of the device, record created
    Created,
    /// Existing record updated
    Updated,
    /// The ledger could not be read or written
    Failed(Error),
}

impl LedgerUpdate {
    /// Returns true when the reconciliation was recorded
    pub fn is_recorded(&self) -> bool {
        !matches!(self, LedgerUpdate::Failed(_))
    }
}

/// Records `now` as the last sync time of `dev_eui`
///
/// Creates the record on first sight of the device. Errors are logged and
/// returned as [`LedgerUpdate::Failed`], never retried. The read and the
/// write are not transactional: concurrent uplinks of one device may race
/// into a duplicate create or a lost update.
pub async fn upsert_last_sync(
    ledger: &dyn DeviceLedger,
    dev_eui: DevEui,
    now: DateTime<Utc>,
) -> LedgerUpdate {
    match ledger.get(dev_eui).await {
        Ok(mut device) => {
            device.updated_at = now;
            device.last_sync_at = Some(now);
            match ledger.update(&device).await {
                Ok(()) => {
                    info!(dev_eui = %dev_eui, "clocksync: clocksync device updated");
                    LedgerUpdate::Updated
                }
                Err(e) => {
                    warn!(dev_eui = %dev_eui, error = %e, "clocksync: could not update clocksync device");
                    LedgerUpdate::Failed(e)
                }
            }
        }
        Err(Error::NotFound(_)) => {
            let device = ClocksyncDevice {
                dev_eui,
                created_at: now,
                updated_at: now,
                last_sync_at: Some(now),
            };
            match ledger.create(&device).await {
                Ok(()) => {
                    info!(dev_eui = %dev_eui, "clocksync: clocksync device created");
                    LedgerUpdate::Created
                }
                Err(e) => {
                    warn!(dev_eui = %dev_eui, error = %e, "clocksync: could not create clocksync device");
                    LedgerUpdate::Failed(e)
                }
            }
        }
        Err(e) => {
            warn!(dev_eui = %dev_eui, error = %e, "clocksync: could not read clocksync device");
            LedgerUpdate::Failed(e)
        }
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ClocksyncDevice, DeviceLedger};
use crate::core::{DevEui, Error, Result};

/// In-memory ledger, for tests and deployments without a database
#[derive(Debug, Default)]
pub struct MemoryLedger {
    devices: RwLock<HashMap<DevEui, ClocksyncDevice>>,
}

impl MemoryLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known devices
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Returns true when no device has been recorded
    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

#[async_trait]
impl DeviceLedger for MemoryLedger {
    async fn get(&self, dev_eui: DevEui) -> Result<ClocksyncDevice> {
        self.devices
            .read()
            .await
            .get(&dev_eui)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("clocksync device {}", dev_eui)))
    }

    async fn create(&self, device: &ClocksyncDevice) -> Result<()> {
        let mut devices = self.devices.write().await;
        if devices.contains_key(&device.dev_eui) {
            return Err(Error::storage(format!(
                "duplicate key: clocksync device {}",
                device.dev_eui
            )));
        }
        devices.insert(device.dev_eui, device.clone());
        Ok(())
    }

    async fn update(&self, device: &ClocksyncDevice) -> Result<()> {
        let mut devices = self.devices.write().await;
        let stored = devices
            .get_mut(&device.dev_eui)
            .ok_or_else(|| Error::not_found(format!("clocksync device {}", device.dev_eui)))?;
        stored.updated_at = device.updated_at;
        stored.last_sync_at = device.last_sync_at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn device(eui: u8) -> ClocksyncDevice {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        ClocksyncDevice {
            dev_eui: DevEui([eui; 8]),
            created_at: now,
            updated_at: now,
            last_sync_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_missing() {
        let ledger = MemoryLedger::new();
        assert!(ledger.is_empty().await);
        assert!(matches!(
            ledger.get(DevEui([9; 8])).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let ledger = MemoryLedger::new();
        ledger.create(&device(1)).await.unwrap();
        assert_eq!(ledger.get(DevEui([1; 8])).await.unwrap(), device(1));

        assert!(matches!(
            ledger.create(&device(1)).await,
            Err(Error::Storage(_))
        ));
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let ledger = MemoryLedger::new();
        ledger.create(&device(2)).await.unwrap();

        let mut changed = device(2);
        changed.created_at = changed.created_at + chrono::TimeDelta::days(1);
        changed.updated_at = changed.updated_at + chrono::TimeDelta::hours(1);
        changed.last_sync_at = Some(changed.updated_at);
        ledger.update(&changed).await.unwrap();

        let stored = ledger.get(DevEui([2; 8])).await.unwrap();
        assert_eq!(stored.created_at, device(2).created_at);
        assert_eq!(stored.updated_at, changed.updated_at);
        assert_eq!(stored.last_sync_at, changed.last_sync_at);

        assert!(matches!(
            ledger.update(&device(3)).await,
            Err(Error::NotFound(_))
        ));
    }
}

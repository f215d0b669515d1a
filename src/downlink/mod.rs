//! Downlink delivery
//!
//! The handler hands answers to a [`DownlinkQueue`], which enqueues them for
//! later transmission to the device. Delivery timing is owned by the network
//! server; only the enqueue outcome is observable here.

mod mock;

pub use self::mock::MockDownlink;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::{DeviceQueueItem, Error, Result};

/// Enqueues payloads for transmission to devices
#[async_trait]
pub trait DownlinkQueue: Send + Sync {
    /// Enqueues `item`; an error means the device will not receive it
    async fn enqueue(&self, item: DeviceQueueItem) -> Result<()>;
}

/// Downlink queue forwarding items over a channel to a delivery task
#[derive(Debug, Clone)]
pub struct ChannelDownlink {
    queue_tx: mpsc::Sender<DeviceQueueItem>,
}

impl ChannelDownlink {
    /// Creates a queue and the receiving end the delivery task drains
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<DeviceQueueItem>) {
        let (queue_tx, queue_rx) = mpsc::channel(buffer);
        (ChannelDownlink { queue_tx }, queue_rx)
    }
}

#[async_trait]
impl DownlinkQueue for ChannelDownlink {
    async fn enqueue(&self, item: DeviceQueueItem) -> Result<()> {
        self.queue_tx
            .send(item)
            .await
            .map_err(|e| Error::downlink(format!("Failed to enqueue payload: {}", e)))
    }
}

//! Mock downlink queue for testing
//!
//! Captures enqueued items for verification and can be told to fail

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::DownlinkQueue;
use crate::core::{DeviceQueueItem, Error, Result};

/// Mock downlink queue for testing
#[derive(Debug, Default, Clone)]
pub struct MockDownlink {
    inner: Arc<Mutex<MockDownlinkInner>>,
}

#[derive(Debug, Default)]
struct MockDownlinkInner {
    enqueued: Vec<DeviceQueueItem>,
    fail_next_enqueue: Option<String>,
    fail_all: bool,
}

impl MockDownlink {
    /// Create a new mock queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all items that were enqueued
    pub fn enqueued(&self) -> Vec<DeviceQueueItem> {
        self.with_inner(|inner| inner.enqueued.clone())
    }

    /// Get the last item that was enqueued
    pub fn last_enqueued(&self) -> Option<DeviceQueueItem> {
        self.with_inner(|inner| inner.enqueued.last().cloned())
    }

    /// Cause the next enqueue() to fail with the given error
    pub fn fail_next_enqueue(&self, error: &str) {
        self.with_inner(|inner| inner.fail_next_enqueue = Some(error.to_string()));
    }

    /// Cause every enqueue() to fail until reset
    pub fn fail_all(&self) {
        self.with_inner(|inner| inner.fail_all = true);
    }

    /// Clear all state
    pub fn reset(&self) {
        self.with_inner(|inner| *inner = MockDownlinkInner::default());
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut MockDownlinkInner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inner)
    }
}

#[async_trait]
impl DownlinkQueue for MockDownlink {
    async fn enqueue(&self, item: DeviceQueueItem) -> Result<()> {
        self.with_inner(|inner| {
            if inner.fail_all {
                return Err(Error::downlink("queue unavailable"));
            }
            if let Some(error) = inner.fail_next_enqueue.take() {
                return Err(Error::downlink(error));
            }
            inner.enqueued.push(item);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DevEui;
    use bytes::Bytes;

    fn item(n: u8) -> DeviceQueueItem {
        DeviceQueueItem {
            dev_eui: DevEui([n; 8]),
            f_port: 202,
            data: Bytes::from(vec![n]),
        }
    }

    #[tokio::test]
    async fn test_records_items() {
        let queue = MockDownlink::new();
        queue.enqueue(item(1)).await.unwrap();
        queue.enqueue(item(2)).await.unwrap();

        assert_eq!(queue.enqueued().len(), 2);
        assert_eq!(queue.last_enqueued(), Some(item(2)));
    }

    #[tokio::test]
    async fn test_fail_next() {
        let queue = MockDownlink::new();
        queue.fail_next_enqueue("timeout");

        assert!(matches!(queue.enqueue(item(1)).await, Err(Error::Downlink(_))));
        queue.enqueue(item(1)).await.unwrap();
        assert_eq!(queue.enqueued().len(), 1);

        queue.fail_all();
        assert!(queue.enqueue(item(2)).await.is_err());
        assert!(queue.enqueue(item(3)).await.is_err());

        queue.reset();
        assert!(queue.enqueued().is_empty());
        queue.enqueue(item(4)).await.unwrap();
    }
}

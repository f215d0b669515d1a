//! LoRaWAN Application Layer Clock Synchronization
//!
//! This library implements the network side of the clock synchronization
//! package: devices report their clock in an AppTimeReq uplink, the handler
//! compares it with the gateway reference time and, when needed, enqueues an
//! AppTimeAns downlink carrying the correction. Successful corrections are
//! recorded per device in a ledger.
pub mod core;

pub mod downlink;
pub mod ledger;
pub mod protocol;
pub mod router;
pub mod sync;
pub mod time;
pub mod util;

// Re-export commonly used items
pub use crate::core::{ClockSyncConfig, DevEui, Error, Result, UplinkEvent};
pub use crate::router::{EventRouter, UplinkHandler};
pub use crate::sync::{ClockSyncHandler, SyncOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProtoDuration, RxInfo};
    use crate::downlink::ChannelDownlink;
    use crate::ledger::{DeviceLedger, MemoryLedger};
    use crate::protocol::{decode_downlink, AppTimeReq, ClockSyncCommand};
    use std::sync::Arc;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_router_to_downlink_channel() {
        let config = ClockSyncConfig::default();
        let (downlink, mut queue_rx) = ChannelDownlink::channel(config.downlink_buffer);
        let ledger = Arc::new(MemoryLedger::new());
        let handler = Arc::new(ClockSyncHandler::new(
            &config,
            Arc::new(downlink),
            ledger.clone(),
        ));
        let router = EventRouter::new(vec![handler as Arc<dyn UplinkHandler>]);

        let dev_eui: DevEui = "70b3d57ed0001234".parse().unwrap();
        let data = ClockSyncCommand::AppTimeReq(AppTimeReq {
            device_time: 1_000_000,
            ans_required: false,
            token_req: 7,
        })
        .to_bytes()
        .unwrap();
        let event = UplinkEvent {
            dev_eui,
            f_port: config.f_port,
            data,
            rx_info: vec![RxInfo {
                time_since_gps_epoch: Some(ProtoDuration {
                    seconds: 1_000_120,
                    nanos: 0,
                }),
                time: None,
            }],
        };

        router.dispatch(&event).await.unwrap();

        let item = queue_rx.recv().await.unwrap();
        assert_eq!(item.dev_eui, dev_eui);
        match decode_downlink(&item.data).unwrap() {
            ClockSyncCommand::AppTimeAns(ans) => {
                assert_eq!(ans.time_correction, 120);
                assert_eq!(ans.token_ans, 7);
            }
            other => panic!("unexpected downlink {:?}", other),
        }
        assert!(ledger.get(dev_eui).await.unwrap().last_sync_at.is_some());
    }
}

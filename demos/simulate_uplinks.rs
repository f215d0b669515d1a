use std::sync::Arc;

use bytes::Bytes;
use lora_clocksync::core::{ProtoDuration, RxInfo};
use lora_clocksync::downlink::ChannelDownlink;
use lora_clocksync::protocol::{decode_downlink, AppTimeReq, ClockSyncCommand};
use lora_clocksync::time::{gps_seconds_u32, time_since_gps_epoch, Clock, SystemClock};
use lora_clocksync::util::init_logging;
use lora_clocksync::{
    ClockSyncConfig, ClockSyncHandler, DevEui, EventRouter, UplinkEvent, UplinkHandler,
};
use tokio::sync::mpsc;

/// Builds an AppTimeReq uplink from a device whose clock is off by `offset` seconds
fn uplink(
    dev_eui: DevEui,
    f_port: u8,
    network_time: u32,
    offset: i32,
    ans_required: bool,
    token: u8,
) -> lora_clocksync::Result<UplinkEvent> {
    let data: Bytes = ClockSyncCommand::AppTimeReq(AppTimeReq {
        device_time: network_time.wrapping_add(offset as u32),
        ans_required,
        token_req: token,
    })
    .to_bytes()?;

    Ok(UplinkEvent {
        dev_eui,
        f_port,
        data,
        rx_info: vec![RxInfo {
            time_since_gps_epoch: Some(ProtoDuration {
                seconds: i64::from(network_time),
                nanos: 0,
            }),
            time: None,
        }],
    })
}

#[tokio::main]
async fn main() -> lora_clocksync::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ClockSyncConfig::load(path)?,
        None => ClockSyncConfig::default(),
    };
    init_logging(&config.log_filter)?;

    let (downlink, mut queue_rx) = ChannelDownlink::channel(config.downlink_buffer);
    let handler = Arc::new(ClockSyncHandler::from_config(&config, Arc::new(downlink))?);
    let router = Arc::new(EventRouter::new(vec![handler as Arc<dyn UplinkHandler>]));

    let (uplink_tx, uplink_rx) = mpsc::channel(config.downlink_buffer);
    let router_task = tokio::spawn(router.run(uplink_rx));

    let network_time = gps_seconds_u32(time_since_gps_epoch(SystemClock.now())?);
    let devices: Vec<DevEui> = (1..=4u8)
        .map(|n| DevEui([0x70, 0xb3, 0xd5, 0x7e, 0xd0, 0x00, 0x00, n]))
        .collect();

    println!("Simulating clock sync uplinks on port {}:", config.f_port);
    println!("- {}: clock 2s ahead, no answer requested (suppressed)", devices[0]);
    println!("- {}: clock 5s behind, no answer requested", devices[1]);
    println!("- {}: clock in sync, answer requested", devices[2]);
    println!("- {}: clock 10 minutes ahead", devices[3]);

    let events = vec![
        uplink(devices[0], config.f_port, network_time, 2, false, 1)?,
        uplink(devices[1], config.f_port, network_time, -5, false, 2)?,
        uplink(devices[2], config.f_port, network_time, 0, true, 3)?,
        uplink(devices[3], config.f_port, network_time, 600, false, 4)?,
    ];

    for event in events {
        uplink_tx
            .send(event)
            .await
            .map_err(|e| lora_clocksync::Error::config(format!("router stopped: {}", e)))?;
    }
    drop(uplink_tx);

    router_task
        .await
        .map_err(|e| lora_clocksync::Error::config(format!("router task failed: {}", e)))??;

    println!("\nDownlinks enqueued:");
    while let Ok(item) = queue_rx.try_recv() {
        match decode_downlink(&item.data)? {
            ClockSyncCommand::AppTimeAns(ans) => println!(
                "- {} port {}: correction {:+}s, token {}",
                item.dev_eui, item.f_port, ans.time_correction, ans.token_ans
            ),
            other => println!("- {}: {:?}", item.dev_eui, other),
        }
    }

    Ok(())
}

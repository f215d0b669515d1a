use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::util::{clock_drift, should_suppress};
use super::{IgnoreReason, SyncOutcome};
use crate::core::{ClockSyncConfig, DevEui, DeviceQueueItem, Result, RxInfo, UplinkEvent};
use crate::downlink::DownlinkQueue;
use crate::ledger::{upsert_last_sync, DeviceLedger, MemoryLedger, SqliteLedger};
use crate::protocol::{self, AppTimeAns, AppTimeReq, Cid, ClockSyncCommand};
use crate::router::UplinkHandler;
use crate::time::{gps_seconds_u32, resolve_rx_gps_time, time_from_gps_epoch, Clock, SystemClock};

/// Network side of the clock synchronization package
///
/// Stateless across uplinks: everything it remembers lives in the ledger.
pub struct ClockSyncHandler {
    f_port: u8,
    suppression_threshold: u32,
    downlink: Arc<dyn DownlinkQueue>,
    ledger: Arc<dyn DeviceLedger>,
    clock: Arc<dyn Clock>,
}

impl ClockSyncHandler {
    /// Creates a handler using the system clock
    pub fn new(
        config: &ClockSyncConfig,
        downlink: Arc<dyn DownlinkQueue>,
        ledger: Arc<dyn DeviceLedger>,
    ) -> Self {
        ClockSyncHandler {
            f_port: config.f_port,
            suppression_threshold: config.suppression_threshold,
            downlink,
            ledger,
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates a handler with the ledger selected by the configuration
    ///
    /// A `database_path` selects the SQLite ledger, otherwise records are
    /// kept in memory.
    pub fn from_config(config: &ClockSyncConfig, downlink: Arc<dyn DownlinkQueue>) -> Result<Self> {
        config.validate()?;
        let ledger: Arc<dyn DeviceLedger> = match &config.database_path {
            Some(path) => Arc::new(SqliteLedger::open(path)?),
            None => Arc::new(MemoryLedger::new()),
        };
        Ok(Self::new(config, downlink, ledger))
    }

    /// Replaces the clock used for fallback reference time and ledger stamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Application port this handler listens on
    pub fn f_port(&self) -> u8 {
        self.f_port
    }

    /// Handles one uplink event
    ///
    /// Events on other ports are ignored. Decode errors are returned without
    /// side effects.
    pub async fn handle_uplink(&self, event: &UplinkEvent) -> Result<SyncOutcome> {
        if event.f_port != self.f_port {
            return Ok(SyncOutcome::Ignored(IgnoreReason::OtherPort(event.f_port)));
        }

        let command = protocol::decode_uplink(&event.data).map_err(|e| {
            error!(dev_eui = %event.dev_eui, error = %e, "clocksync: unmarshal command error");
            e
        })?;

        self.handle_command(event.dev_eui, command, &event.rx_info).await
    }

    /// Handles an already decoded uplink command
    pub async fn handle_command(
        &self,
        dev_eui: DevEui,
        command: ClockSyncCommand,
        rx_info: &[RxInfo],
    ) -> Result<SyncOutcome> {
        info!(dev_eui = %dev_eui, cid = %command.cid(), "clocksync: command received");

        match command.cid() {
            Cid::AppTime => {
                let req = command.into_app_time_req().map_err(|e| {
                    error!(dev_eui = %dev_eui, error = %e, "clocksync: unexpected payload");
                    e
                })?;
                let gps_time_of_rx = resolve_rx_gps_time(rx_info, self.clock.as_ref());
                self.handle_app_time_req(dev_eui, gps_time_of_rx, req).await
            }
            cid => {
                if let ClockSyncCommand::PackageVersionAns {
                    package_identifier,
                    package_version,
                } = command
                {
                    if package_identifier != protocol::PACKAGE_IDENTIFIER {
                        warn!(
                            dev_eui = %dev_eui,
                            package_identifier,
                            "clocksync: device reports a different package"
                        );
                    } else if package_version != protocol::PACKAGE_VERSION {
                        warn!(
                            dev_eui = %dev_eui,
                            package_version,
                            expected = protocol::PACKAGE_VERSION,
                            "clocksync: package version mismatch"
                        );
                    } else {
                        info!(dev_eui = %dev_eui, package_version, "clocksync: package version");
                    }
                }
                Ok(SyncOutcome::Ignored(IgnoreReason::UnhandledCommand(cid)))
            }
        }
    }

    async fn handle_app_time_req(
        &self,
        dev_eui: DevEui,
        gps_time_of_rx: Duration,
        req: AppTimeReq,
    ) -> Result<SyncOutcome> {
        let device_time = time_from_gps_epoch(Duration::from_secs(u64::from(req.device_time)))
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        info!(
            dev_eui = %dev_eui,
            device_time = req.device_time,
            device_time_str = %device_time,
            ans_required = req.ans_required,
            token_req = req.token_req,
            "clocksync: AppTimeReq received"
        );

        let network_time = gps_seconds_u32(gps_time_of_rx);
        let drift = clock_drift(network_time, req.device_time);

        if should_suppress(req.ans_required, drift, self.suppression_threshold) {
            info!(
                dev_eui = %dev_eui,
                drift,
                "clocksync: device requested no answer and drift was low"
            );
            return Ok(SyncOutcome::Suppressed { drift });
        }

        let answer = AppTimeAns {
            time_correction: drift,
            token_ans: req.token_req,
        };
        let data = ClockSyncCommand::AppTimeAns(answer).to_bytes()?;

        self.downlink
            .enqueue(DeviceQueueItem {
                dev_eui,
                f_port: self.f_port,
                data,
            })
            .await
            .map_err(|e| {
                error!(dev_eui = %dev_eui, error = %e, "clocksync: enqueue payload error");
                e
            })?;

        let now = self.clock.now();
        let ledger = upsert_last_sync(self.ledger.as_ref(), dev_eui, now).await;

        info!(
            dev_eui = %dev_eui,
            time_correction = drift,
            token = answer.token_ans,
            "clocksync: AppTimeAns sent"
        );

        Ok(SyncOutcome::AnswerSent {
            answer,
            synced_at: now,
            ledger,
        })
    }
}

#[async_trait]
impl UplinkHandler for ClockSyncHandler {
    fn name(&self) -> &str {
        "clocksync"
    }

    async fn on_uplink(&self, event: &UplinkEvent) -> Result<()> {
        self.handle_uplink(event).await.map(|_| ())
    }
}

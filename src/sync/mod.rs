//! Clock reconciliation
//!
//! This module compares the clock a device reports in AppTimeReq with the
//! network reference time, decides whether a correction is worth a downlink
//! and records successful corrections in the ledger.

pub mod handler;

pub use self::handler::ClockSyncHandler;

use chrono::{DateTime, Utc};

use crate::ledger::LedgerUpdate;
use crate::protocol::{AppTimeAns, Cid};

/// Why an uplink produced no reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Uplink on another application port
    OtherPort(u8),
    /// Command without network-side reconciliation behaviour
    UnhandledCommand(Cid),
}

/// Result of handling one uplink
///
/// Protocol failures are returned as errors; ledger failures are reported
/// here through [`LedgerUpdate::Failed`] because the answer has already been
/// handed to the downlink queue by then.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Nothing to do for this uplink
    Ignored(IgnoreReason),
    /// Drift too small and no answer requested; nothing sent, nothing recorded
    Suppressed {
        /// Network time minus device time, seconds
        drift: i32,
    },
    /// Correction enqueued for the device
    AnswerSent {
        /// The enqueued answer
        answer: AppTimeAns,
        /// Time recorded as the device's last sync
        synced_at: DateTime<Utc>,
        /// Outcome of the ledger write
        ledger: LedgerUpdate,
    },
}

impl SyncOutcome {
    /// Returns the enqueued answer, if any
    pub fn answer(&self) -> Option<&AppTimeAns> {
        match self {
            SyncOutcome::AnswerSent { answer, .. } => Some(answer),
            _ => None,
        }
    }
}

/// Utility functions for reconciliation
pub mod util {
    /// Computes the correction a device needs, in seconds
    ///
    /// Both clocks are 32-bit GPS seconds; the subtraction wraps so a device
    /// just across the 2^32 boundary still gets a small correction.
    pub fn clock_drift(network_time: u32, device_time: u32) -> i32 {
        network_time.wrapping_sub(device_time) as i32
    }

    /// Returns true when no answer should be sent
    ///
    /// Only drifts strictly inside `(-threshold, threshold)` are suppressed,
    /// and never when the device asked for an answer.
    pub fn should_suppress(ans_required: bool, drift: i32, threshold: u32) -> bool {
        let threshold = i64::from(threshold);
        let drift = i64::from(drift);
        !ans_required && drift > -threshold && drift < threshold
    }
}

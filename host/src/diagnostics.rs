//! Heartbeat and LED collaborators backed by the `log` facade.

use log::{debug, info, warn};
use radio_core::traits::{DiagnosticsSink, StatusIndicator};
use radio_core::HeartbeatReport;
use tokio::sync::watch;

/// Logs every heartbeat as JSON and publishes the latest one
pub struct LogDiagnostics {
    latest: watch::Sender<Option<HeartbeatReport>>,
}

impl LogDiagnostics {
    /// Create the sink and a receiver for the latest report
    pub fn new() -> (Self, watch::Receiver<Option<HeartbeatReport>>) {
        let (latest, rx) = watch::channel(None);
        (Self { latest }, rx)
    }
}

impl DiagnosticsSink for LogDiagnostics {
    fn report(&mut self, report: &HeartbeatReport) {
        match serde_json::to_string(report) {
            Ok(json) => info!("heartbeat {}", json),
            Err(e) => warn!("heartbeat not serializable: {}", e),
        }
        self.latest.send_replace(Some(*report));
    }
}

/// Status LED stand-in that logs transitions
#[derive(Debug, Default)]
pub struct LogIndicator {
    on: bool,
    flashes: u64,
}

impl LogIndicator {
    /// Current LED state
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Number of times the LED was switched on
    pub fn flashes(&self) -> u64 {
        self.flashes
    }
}

impl StatusIndicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if on && !self.on {
            self.flashes += 1;
        }
        self.on = on;
        debug!("led {}", if on { "on" } else { "off" });
    }
}

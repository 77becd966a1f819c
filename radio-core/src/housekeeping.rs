//! Heartbeat reporting and status LED schedule.
//!
//! Runs on the tick period alongside [`crate::tick::BridgeTick`] but never
//! influences what crosses the bridge.

use serde::{Deserialize, Serialize};

use crate::config::BridgeConfig;
use crate::framer::FramerStats;
use crate::link::LinkStats;
use crate::traits::{DiagnosticsSink, StatusIndicator};

/// Overflow counters of the two wired ring channels
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WiredStats {
    /// Bytes dropped on the wired-in channel
    pub rx_overflow: u32,
    /// Bytes dropped on the wired-out channel
    pub tx_overflow: u32,
}

/// One periodic diagnostics record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeartbeatReport {
    /// Radio counters
    pub link: LinkStats,
    /// Ring channel overflow counters
    pub wired: WiredStats,
    /// Packets completed by the framer
    pub packets_framed: u32,
    /// Headers discarded for a bad length
    pub bad_headers: u32,
    /// Free heap in bytes, if the platform can tell
    pub free_memory: Option<u32>,
}

impl HeartbeatReport {
    /// Assemble a report from the individual counter sets
    pub fn new(
        link: LinkStats,
        wired: WiredStats,
        framer: FramerStats,
        free_memory: Option<u32>,
    ) -> Self {
        Self {
            link,
            wired,
            packets_framed: framer.packets,
            bad_headers: framer.bad_headers,
            free_memory,
        }
    }
}

/// Tick-counted schedules for the heartbeat and the LED flash
#[derive(Debug, Clone)]
pub struct Housekeeping {
    heartbeat_ticks: u32,
    led_period_ticks: u32,
    led_flash_ticks: u32,
    heartbeat_counter: u32,
    led_counter: u32,
}

impl Housekeeping {
    /// Schedules from the configuration
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            heartbeat_ticks: config.heartbeat_ticks.max(1),
            led_period_ticks: config.led_period_ticks.max(1),
            led_flash_ticks: config.led_flash_ticks,
            heartbeat_counter: 0,
            led_counter: 0,
        }
    }

    /// Advance both schedules by one tick
    ///
    /// `report` is only called when a heartbeat is due.
    pub fn tick<F, D, L>(&mut self, report: F, diagnostics: &mut D, led: &mut L)
    where
        F: FnOnce() -> HeartbeatReport,
        D: DiagnosticsSink + ?Sized,
        L: StatusIndicator + ?Sized,
    {
        // LED: on at the end of the period, off after the flash
        self.led_counter += 1;
        if self.led_counter == self.led_period_ticks {
            led.set(true);
        }
        if self.led_counter >= self.led_period_ticks.saturating_add(self.led_flash_ticks) {
            led.set(false);
            self.led_counter = 0;
        }

        self.heartbeat_counter += 1;
        if self.heartbeat_counter >= self.heartbeat_ticks {
            self.heartbeat_counter = 0;
            let report = report();
            info!(
                "heartbeat tx={} txerr={} rx={} rxdrop={}",
                report.link.tx_count,
                report.link.tx_error_count,
                report.link.rx_count,
                report.link.rx_drop_count
            );
            diagnostics.report(&report);
        }
    }
}

//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! The serial console's push channel implements the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | stage={} | panel={:.1}V batt={:.2}V | \
                     chg={:.0}mA load={:.0}mA net={:.0}mA | T={:.1}\u{00b0}C | \
                     soc={:.0}% duty={} | load={} | faults=0b{:08b}",
                    t.stage,
                    t.panel_voltage_v,
                    t.battery_voltage_v,
                    t.charge_current_ma,
                    t.load_current_ma,
                    t.net_current_ma,
                    t.temperature_c,
                    t.soc_pct,
                    t.duty,
                    if t.load_on { "ON" } else { "OFF" },
                    t.fault_flags,
                );
            }
            AppEvent::StageChanged { from, to } => {
                info!("STAGE | {} -> {}", from, to);
            }
            AppEvent::FaultDetected(flags) => {
                info!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::LoadSwitched { on } => {
                info!("LOAD | {}", if *on { "connected" } else { "disconnected" });
            }
            AppEvent::ConfigApplied => {
                info!("CONFIG | replacement applied");
            }
            AppEvent::Started(stage) => {
                info!("START | initial_stage={}", stage);
            }
        }
    }
}

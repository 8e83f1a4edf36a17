//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, push over the
//! console link, capture in a test harness, etc.

use serde::Serialize;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The charge FSM moved between stages.
    StageChanged {
        from: &'static str,
        to: &'static str,
    },

    /// One or more safety faults were raised (bitmask).
    FaultDetected(u8),

    /// All safety faults cleared; the charger recovered to BULK.
    FaultCleared,

    /// The load guard opened or closed the load switch.
    LoadSwitched { on: bool },

    /// A validated configuration replacement took effect.
    ConfigApplied,

    /// The application service has started (carries initial stage name).
    Started(&'static str),
}

/// A point-in-time telemetry snapshot suitable for logging or the
/// console `DATA:` response.
///
/// Values here are display-floored: non-finite readings become 0 and
/// unidirectional currents never show negative noise.  The control loop
/// itself always sees the raw snapshot — cosmetics stop at this struct.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryData {
    pub stage: &'static str,
    pub duty: u16,
    pub panel_voltage_v: f32,
    pub battery_voltage_v: f32,
    pub charge_current_ma: f32,
    pub load_current_ma: f32,
    /// Charge minus load current; negative while discharging.
    pub net_current_ma: f32,
    pub temperature_c: f32,
    pub soc_pct: f32,
    pub accumulated_ah: f32,
    pub absorption_threshold_ma: f32,
    pub float_limit_ma: f32,
    pub absorption_budget_hours: f32,
    pub load_on: bool,
    pub lvd_latched: bool,
    /// Seconds left on a temporary load-off, 0 when none is active.
    pub temp_off_remaining_secs: u32,
    pub fault_flags: u8,
    pub uptime_secs: u64,
    /// Live status line (last notable action), not the persisted note.
    pub status_note: heapless::String<64>,
}

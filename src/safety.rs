//! Safety supervisor.
//!
//! The supervisor runs **every tick before the FSM** and accumulates a
//! fault bitmask in `FsmContext.fault_flags`.  The stage handlers check
//! this mask to decide whether to transition to `Error`.
//!
//! ## Fault lifecycle
//!
//! 1. A condition trips a fault (e.g. temperature at the shutdown line).
//! 2. The supervisor sets the corresponding bit in `fault_flags`.
//! 3. The FSM transitions to `Error`; `error_enter` zeroes the charge duty.
//! 4. Each tick in `Error`, the supervisor re-evaluates.  If the
//!    condition clears, it unsets the bit.
//! 5. Once `fault_flags == 0` has held for the recovery debounce, the
//!    `error_update` handler returns `Some(StateId::Bulk)`.
//!
//! This approach supports **multiple simultaneous faults**: the system
//! does not leave `Error` until *every* fault is resolved.  Readings
//! are never clamped into plausibility here — an implausible value is a
//! fault, not a number to repair.

use crate::config::ChargerConfig;
use crate::error::SafetyFault;
use crate::fsm::context::SensorSnapshot;
use log::{error, info};

/// Temperature at or above which charging shuts down (°C).
pub const TEMP_SHUTDOWN_C: f32 = 90.0;

/// Absolute battery voltage ceiling (V), above any valid stage setpoint.
pub const BATTERY_OVERVOLT_V: f32 = 15.5;

/// Headroom over the configured current ceiling before OverCurrent trips.
const OVERCURRENT_MARGIN: f32 = 1.25;

// Physical plausibility windows.  Outside these the reading is treated
// as a sensor failure rather than a real electrical event.
const BATTERY_PLAUSIBLE_MAX_V: f32 = 40.0;
const PANEL_PLAUSIBLE_MAX_V: f32 = 60.0;
const CURRENT_PLAUSIBLE_MAX_MA: f32 = 30_000.0;
const TEMP_PLAUSIBLE_MIN_C: f32 = -40.0;
const TEMP_PLAUSIBLE_MAX_C: f32 = 150.0;

/// Safety supervisor.
pub struct SafetySupervisor {
    /// Latched fault bitmask.
    faults: u8,
    /// Charging current that trips OverCurrent (mA).
    overcurrent_trip_ma: f32,
}

impl SafetySupervisor {
    pub fn new(config: &ChargerConfig) -> Self {
        Self {
            faults: 0,
            overcurrent_trip_ma: config.effective_max_ma() * OVERCURRENT_MARGIN,
        }
    }

    /// Re-derive limits after a wholesale config replacement.
    pub fn apply_config(&mut self, config: &ChargerConfig) {
        self.overcurrent_trip_ma = config.effective_max_ma() * OVERCURRENT_MARGIN;
    }

    /// Evaluate all safety conditions against the latest sensor snapshot.
    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, snap: &SensorSnapshot) -> u8 {
        // ── Sensor plausibility ───────────────────────────────────
        self.eval_fault(SafetyFault::SensorFault, !reading_plausible(snap));

        // ── Temperature ───────────────────────────────────────────
        self.eval_fault(
            SafetyFault::OverTemperature,
            snap.temperature_c >= TEMP_SHUTDOWN_C,
        );

        // ── Current ceiling ───────────────────────────────────────
        self.eval_fault(
            SafetyFault::OverCurrent,
            snap.charge_current_ma > self.overcurrent_trip_ma,
        );

        // ── Voltage ceiling ───────────────────────────────────────
        self.eval_fault(
            SafetyFault::OverVoltage,
            snap.battery_voltage_v >= BATTERY_OVERVOLT_V,
        );

        self.faults
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}

/// Every reading finite and inside its physical window.
fn reading_plausible(snap: &SensorSnapshot) -> bool {
    if !(snap.panel_voltage_v.is_finite()
        && snap.battery_voltage_v.is_finite()
        && snap.charge_current_ma.is_finite()
        && snap.load_current_ma.is_finite()
        && snap.temperature_c.is_finite())
    {
        return false;
    }
    (0.0..=BATTERY_PLAUSIBLE_MAX_V).contains(&snap.battery_voltage_v)
        && (0.0..=PANEL_PLAUSIBLE_MAX_V).contains(&snap.panel_voltage_v)
        && snap.charge_current_ma.abs() <= CURRENT_PLAUSIBLE_MAX_MA
        && snap.load_current_ma.abs() <= CURRENT_PLAUSIBLE_MAX_MA
        && (TEMP_PLAUSIBLE_MIN_C..=TEMP_PLAUSIBLE_MAX_C).contains(&snap.temperature_c)
}

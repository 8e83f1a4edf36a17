//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that stage handlers read from and
//! write to.  It contains the latest sensor snapshot, actuator command
//! outputs, regulator targets, timing information, configuration, and
//! accumulated safety faults.  Think of it as the "blackboard" in a
//! blackboard architecture: the control tick is its only writer.

use crate::config::{ChargerConfig, DerivedThresholds};

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to stage handlers; written by acquisition)
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of every calibrated sensor reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorSnapshot {
    /// Panel (or DC supply) input voltage (V).
    pub panel_voltage_v: f32,
    /// Battery terminal voltage (V).
    pub battery_voltage_v: f32,
    /// Charging current flowing into the battery (mA).
    pub charge_current_ma: f32,
    /// Current drawn by the load output (mA).
    pub load_current_ma: f32,
    /// Battery/electronics temperature from the NTC (°C).
    pub temperature_c: f32,
}

// ---------------------------------------------------------------------------
// Actuator commands (written by stage handlers; consumed by main loop)
// ---------------------------------------------------------------------------

/// Status LED pattern, one per charge stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedPattern {
    #[default]
    Off,
    SlowBlink,
    FastBlink,
    Solid,
}

/// Commands the control tick writes to request actuator actions.
/// The main loop applies these to the actual drivers each tick.
#[derive(Debug, Clone, Copy)]
pub struct ActuatorCommands {
    /// Charging PWM duty (0..=4095).  Written by the duty regulator.
    pub charge_duty: u16,
    /// Load output switch.  Written by the load guard, never by the FSM:
    /// a charging fault must not cut the load, and vice versa.
    pub load_on: bool,
    /// Status LED pattern for the current stage.
    pub led: LedPattern,
}

impl Default for ActuatorCommands {
    fn default() -> Self {
        Self {
            charge_duty: 0,
            load_on: true, // load energised at boot until the guard rules
            led: LedPattern::Off,
        }
    }
}

impl ActuatorCommands {
    /// Everything off, including the load — fatal-shutdown output only.
    pub fn all_off() -> Self {
        Self {
            charge_duty: 0,
            load_on: false,
            led: LedPattern::Off,
        }
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every stage handler function.
pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current stage was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,
    /// Duration of one tick in seconds (inverse of control loop frequency).
    pub tick_period_secs: f32,

    // -- Sensor data --
    /// Latest calibrated readings.  Updated before each FSM tick.
    pub sensors: SensorSnapshot,

    // -- Actuator outputs --
    /// Commands to be applied to actuators after the FSM tick.
    pub commands: ActuatorCommands,

    // -- Regulator setpoints (written by stage handlers) --
    /// Battery voltage the duty regulator drives toward (V).
    pub target_voltage_v: f32,
    /// Charging current ceiling for the active stage (mA).
    pub current_ceiling_ma: f32,

    // -- Configuration --
    /// Charger configuration.  Replaced wholesale between ticks only.
    pub config: ChargerConfig,
    /// Thresholds derived from `config`; recomputed on every replacement.
    pub derived: DerivedThresholds,

    // -- Charge bookkeeping --
    /// Amp-hours accumulated since the last BULK entry.
    pub accumulated_ah: f32,
    /// Absorption duration budget (hours), computed on ABSORPTION entry.
    pub absorption_budget_hours: f32,

    // -- Transition debounce counters --
    /// Consecutive ticks the battery has held the BULK target voltage.
    pub at_target_ticks: u32,
    /// Consecutive ticks charge current has been under the absorption
    /// threshold.
    pub low_current_ticks: u32,
    /// Consecutive ticks battery voltage has sagged under the recharge
    /// threshold in FLOAT.
    pub sag_ticks: u32,
    /// Consecutive fault-free ticks while in ERROR.
    pub fault_clear_ticks: u32,

    // -- Safety --
    /// Accumulated safety fault bitmask (see `SafetyFault::mask()`).
    /// Set by the safety supervisor, read by stage handlers.
    pub fault_flags: u8,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: ChargerConfig) -> Self {
        let derived = DerivedThresholds::from_config(&config);
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            tick_period_secs: crate::config::TICK_PERIOD_MS as f32 / 1000.0,
            sensors: SensorSnapshot::default(),
            commands: ActuatorCommands::default(),
            target_voltage_v: 0.0,
            current_ceiling_ma: 0.0,
            config,
            derived,
            accumulated_ah: 0.0,
            absorption_budget_hours: 0.0,
            at_target_ticks: 0,
            low_current_ticks: 0,
            sag_ticks: 0,
            fault_clear_ticks: 0,
            fault_flags: 0,
        }
    }

    /// Replace the configuration wholesale and recompute derived
    /// thresholds.  Called between ticks only.
    pub fn apply_config(&mut self, config: ChargerConfig) {
        self.derived = DerivedThresholds::from_config(&config);
        self.config = config;
    }

    /// Seconds elapsed since the current stage was entered.
    pub fn secs_in_state(&self) -> f32 {
        self.ticks_in_state as f32 * self.tick_period_secs
    }

    /// Hours elapsed since the current stage was entered.
    pub fn hours_in_state(&self) -> f32 {
        self.secs_in_state() / 3600.0
    }

    /// Returns `true` if **any** safety fault is active.
    pub fn has_faults(&self) -> bool {
        self.fault_flags != 0
    }

    /// Check whether a specific fault flag is set.
    pub fn has_fault(&self, fault: crate::error::SafetyFault) -> bool {
        self.fault_flags & fault.mask() != 0
    }
}

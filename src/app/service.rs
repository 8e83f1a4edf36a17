//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the charge FSM, duty regulator, load guard, safety
//! supervisor, and shared context.  It exposes a clean, hardware-agnostic
//! API.  All I/O flows through port traits injected at call sites, making
//! the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │         AppService           │
//! ActuatorPort ◀──│  FSM · Safety · Regulator    │
//!                 │        · LoadGuard           │
//!                 └──────────────────────────────┘
//! ```

use core::fmt::Write as _;

use log::{info, warn};

use crate::config::{validate_config, ChargerConfig};
use crate::control::regulator::DutyRegulator;
use crate::control::soc::{estimate_soc, Chemistry};
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::loadguard::{LoadGuard, TempOffOutcome};
use crate::safety::SafetySupervisor;

use super::commands::ConfigUpdate;
use super::events::{AppEvent, TelemetryData};
use super::ports::{ActuatorPort, ConfigError, ConfigPort, EventSink, SensorPort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    safety: SafetySupervisor,
    /// Closed-loop PWM duty regulator for the charge path.
    regulator: DutyRegulator,
    /// LVD/LVR hysteresis and temporary-off guard for the load output.
    loadguard: LoadGuard,
    /// Last computed state-of-charge estimate (%).
    soc_pct: f32,
    /// Live status line surfaced in telemetry (last notable action).
    status_note: heapless::String<64>,
    tick_count: u64,
    /// Fault episodes latched since startup (for diagnostics).
    fault_count: u32,
    config_dirty: bool,
    dirty_since_tick: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM — call [`start`](Self::start) next.
    pub fn new(config: ChargerConfig) -> Self {
        let safety = SafetySupervisor::new(&config);
        let ctx = FsmContext::new(config);
        let fsm = Fsm::new(build_state_table(), StateId::Bulk);

        Self {
            fsm,
            ctx,
            safety,
            regulator: DutyRegulator::new(),
            loadguard: LoadGuard::new(),
            soc_pct: 0.0,
            status_note: heapless::String::new(),
            tick_count: 0,
            fault_count: 0,
            config_dirty: false,
            dirty_since_tick: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in BULK with duty 0.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state().as_str()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle:
    /// sensors → safety → FSM → regulator → load guard → actuators.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`] — this avoids a double mutable borrow while
    /// keeping the port boundary explicit.  `now_ms` is a monotonic
    /// millisecond clock used only for the load guard's timers.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
        now_ms: u32,
    ) {
        self.tick_count += 1;
        let prev_state = self.fsm.current_state();

        // 1. Read sensors via SensorPort
        let snapshot = hw.read_all();
        self.ctx.sensors = snapshot;

        // 2. Safety evaluation
        let faults = self.safety.evaluate(&snapshot);
        self.ctx.fault_flags = faults;

        if faults != 0 && self.fsm.current_state() != StateId::Error {
            warn!("Safety fault! flags=0b{:08b}", faults);
            self.fault_count += 1;
            self.fsm.force_transition(StateId::Error, &mut self.ctx);
            sink.emit(&AppEvent::FaultDetected(faults));
            self.set_status_note(format_args!("charging fault, output disabled"));
        }

        // 3. FSM tick (stage logic, setpoint refresh, recovery debounce)
        self.fsm.tick(&mut self.ctx);

        // 4. Duty regulation toward the active stage's setpoints.
        //    ERROR holds the regulator at zero so recovery restarts the
        //    ramp from the bottom instead of re-applying a stale duty.
        if self.fsm.current_state() == StateId::Error {
            self.regulator.force_zero();
        } else {
            self.regulator.update(
                self.ctx.target_voltage_v,
                self.ctx.current_ceiling_ma,
                snapshot.battery_voltage_v,
                snapshot.charge_current_ma,
            );
        }
        self.ctx.commands.charge_duty = self.regulator.duty();

        // 5. Charge bookkeeping + SOC estimate
        if snapshot.charge_current_ma > 0.0 {
            self.ctx.accumulated_ah +=
                snapshot.charge_current_ma / 1000.0 / 3600.0 * self.ctx.tick_period_secs;
        }
        self.soc_pct = estimate_soc(
            snapshot.battery_voltage_v,
            Chemistry::from_config(&self.ctx.config),
        );

        // 6. Load guard — runs every tick regardless of charge stage
        let was_on = self.ctx.commands.load_on;
        let load_on = self
            .loadguard
            .tick(snapshot.battery_voltage_v, &self.ctx.config, now_ms);
        self.ctx.commands.load_on = load_on;
        if load_on != was_on {
            sink.emit(&AppEvent::LoadSwitched { on: load_on });
            if load_on {
                self.set_status_note(format_args!("load reconnected"));
            } else if self.loadguard.lvd_latched() {
                self.set_status_note(format_args!("LVD: load disconnected"));
            }
        }

        // 7. Apply actuator commands via ActuatorPort
        self.apply_actuators(hw);

        // 8. Emit stage change if the FSM moved
        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StageChanged {
                from: prev_state.as_str(),
                to: new_state.as_str(),
            });
            if prev_state == StateId::Error {
                sink.emit(&AppEvent::FaultCleared);
                self.set_status_note(format_args!("fault cleared, restarting BULK"));
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply a single-field configuration update as a wholesale
    /// replacement: clone, mutate, validate, swap.  A rejected update
    /// leaves the running configuration untouched.
    pub fn apply_config_update(
        &mut self,
        update: &ConfigUpdate,
        sink: &mut impl EventSink,
    ) -> Result<(), ConfigError> {
        let mut candidate = self.ctx.config.clone();
        update.apply_to(&mut candidate);
        validate_config(&candidate)?;

        self.safety.apply_config(&candidate);
        self.ctx.apply_config(candidate);
        self.mark_config_dirty();
        sink.emit(&AppEvent::ConfigApplied);
        info!("Configuration updated at runtime");
        Ok(())
    }

    /// Replace the full configuration (boot path and tests).
    pub fn replace_config(&mut self, config: ChargerConfig) -> Result<(), ConfigError> {
        validate_config(&config)?;
        self.safety.apply_config(&config);
        self.ctx.apply_config(config);
        self.mark_config_dirty();
        Ok(())
    }

    /// Operator request: disconnect the load for `secs` seconds (1–300).
    ///
    /// Takes effect immediately through the actuator port rather than at
    /// the next tick boundary.
    pub fn request_temp_off(
        &mut self,
        secs: u32,
        now_ms: u32,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> TempOffOutcome {
        let Ok(secs) = u16::try_from(secs) else {
            return TempOffOutcome::InvalidDuration;
        };
        let outcome = self.loadguard.request_temp_off(secs, now_ms);
        if outcome == TempOffOutcome::Started {
            self.ctx.commands.load_on = false;
            hw.set_load(false);
            sink.emit(&AppEvent::LoadSwitched { on: false });
            self.set_status_note(format_args!("load off for {} s", secs));
        }
        outcome
    }

    /// Cancel an active temporary-off.  Returns `true` if one was
    /// pending; the guard is re-run so the load closes immediately
    /// unless the LVD latch holds it open.
    pub fn cancel_temp_off(
        &mut self,
        now_ms: u32,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.loadguard.cancel_temp_off() {
            return false;
        }
        let load_on =
            self.loadguard
                .tick(self.ctx.sensors.battery_voltage_v, &self.ctx.config, now_ms);
        if load_on != self.ctx.commands.load_on {
            self.ctx.commands.load_on = load_on;
            hw.set_load(load_on);
            sink.emit(&AppEvent::LoadSwitched { on: load_on });
        }
        self.set_status_note(format_args!("temporary off cancelled"));
        true
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current context.
    ///
    /// This is the presentation boundary: readings are floored here for
    /// display (non-finite → 0, unidirectional currents never negative)
    /// while the control loop keeps seeing the raw values.
    pub fn build_telemetry(&self, now_ms: u32) -> TelemetryData {
        let snap = &self.ctx.sensors;
        let charge_ma = display_floor(snap.charge_current_ma);
        let load_ma = display_floor(snap.load_current_ma);
        TelemetryData {
            stage: self.fsm.current_state().as_str(),
            duty: self.ctx.commands.charge_duty,
            panel_voltage_v: display_floor(snap.panel_voltage_v),
            battery_voltage_v: display_floor(snap.battery_voltage_v),
            charge_current_ma: charge_ma,
            load_current_ma: load_ma,
            net_current_ma: charge_ma - load_ma,
            temperature_c: display_finite(snap.temperature_c),
            soc_pct: self.soc_pct,
            accumulated_ah: display_floor(self.ctx.accumulated_ah),
            absorption_threshold_ma: self.ctx.derived.absorption_threshold_ma,
            float_limit_ma: self.ctx.derived.float_limit_ma,
            absorption_budget_hours: self.ctx.absorption_budget_hours,
            load_on: self.loadguard.is_load_on(),
            lvd_latched: self.loadguard.lvd_latched(),
            temp_off_remaining_secs: self.loadguard.temp_off_remaining_secs(now_ms),
            fault_flags: self.ctx.fault_flags,
            uptime_secs: self.uptime_secs(),
            status_note: self.status_note.clone(),
        }
    }

    /// Current charge stage.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Fault episodes latched since startup.
    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    /// Seconds since start, derived from the tick counter.
    pub fn uptime_secs(&self) -> u64 {
        (self.tick_count as f32 * self.ctx.tick_period_secs) as u64
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.ctx.fault_flags
    }

    /// Clone of the live configuration (for console read-back).
    pub fn current_config(&self) -> ChargerConfig {
        self.ctx.config.clone()
    }

    // ── Internal ──────────────────────────────────────────────

    /// Translate FSM actuator commands into port calls.
    fn apply_actuators(&self, hw: &mut impl ActuatorPort) {
        let cmds = &self.ctx.commands;

        // Charge path: never driven while faulted, even if a stale
        // command slipped through.
        if self.safety.has_faults() {
            hw.set_charge_duty(0);
        } else {
            hw.set_charge_duty(cmds.charge_duty);
        }

        hw.set_load(cmds.load_on);
        hw.set_led(cmds.led);
    }

    fn set_status_note(&mut self, args: core::fmt::Arguments<'_>) {
        self.status_note.clear();
        let _ = self.status_note.write_fmt(args);
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.  Called on every accepted update.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_tick = self.tick_count;
        }
    }

    /// Check if auto-save should trigger (5 seconds after last change,
    /// so a burst of console SETs becomes one flash write).
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let ticks_since_dirty = self.tick_count.saturating_sub(self.dirty_since_tick);
        let secs_since_dirty = ticks_since_dirty as f32 * self.ctx.tick_period_secs;
        if secs_since_dirty < 5.0 {
            return false;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before reset or shutdown paths).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved before shutdown");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}

/// Presentation flooring: non-finite → 0, negatives clamped to 0.
/// Never applied to values the control loop consumes.
fn display_floor(v: f32) -> f32 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

/// Presentation flooring for values that may be legitimately negative.
fn display_finite(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

//! Concrete stage handler functions and table builder.
//!
//! Each stage is defined by three plain `fn` pointers — no closures, no
//! dynamic dispatch, no heap.  This is the classic embedded C FSM pattern
//! expressed in safe Rust.
//!
//! ```text
//!  BULK ──[V held at target | bulk time cap]──▶ ABSORPTION
//!    ▲                                              │
//!    │                           [I < threshold, debounced | budget spent]
//!    │                                              ▼
//!    └──────[V sag, debounced | load spike]────── FLOAT
//!
//!  Any stage ──[safety fault]──▶ ERROR ──[clear for 30 s]──▶ BULK
//! ```
//!
//! Stage handlers own the regulator setpoints (`target_voltage_v`,
//! `current_ceiling_ma`) and refresh them every tick, so a wholesale
//! config replacement between ticks takes effect immediately instead of
//! waiting for the next transition.

use super::context::{FsmContext, LedPattern};
use super::{StateDescriptor, StateId};
use log::{info, warn};

/// Consecutive qualifying ticks before a stage transition is accepted.
/// At the 1 s control tick this is a 5 s debounce window.
pub const STAGE_DEBOUNCE_TICKS: u32 = 5;

/// Consecutive fault-free ticks required to leave ERROR (30 s at the
/// 1 s tick) — deliberately an order slower than fault entry.
pub const FAULT_CLEAR_TICKS: u32 = 30;

/// Battery counts as "at target" within this band below the setpoint.
const VOLTAGE_REACHED_BAND_V: f32 = 0.1;

/// Floor for the computed absorption budget.
const MIN_ABSORPTION_HOURS: f32 = 0.1;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Bulk
        StateDescriptor {
            id: StateId::Bulk,
            name: "Bulk",
            on_enter: Some(bulk_enter),
            on_exit: None,
            on_update: bulk_update,
        },
        // Index 1 — Absorption
        StateDescriptor {
            id: StateId::Absorption,
            name: "Absorption",
            on_enter: Some(absorption_enter),
            on_exit: None,
            on_update: absorption_update,
        },
        // Index 2 — Float
        StateDescriptor {
            id: StateId::Float,
            name: "Float",
            on_enter: Some(float_enter),
            on_exit: None,
            on_update: float_update,
        },
        // Index 3 — Error
        StateDescriptor {
            id: StateId::Error,
            name: "Error",
            on_enter: Some(error_enter),
            on_exit: Some(error_exit),
            on_update: error_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  BULK stage — maximum-current charge toward the bulk voltage
// ═══════════════════════════════════════════════════════════════════════════

fn bulk_enter(ctx: &mut FsmContext) {
    ctx.target_voltage_v = ctx.config.bulk_voltage_v;
    ctx.current_ceiling_ma = ctx.config.effective_max_ma();
    // A fresh charge cycle: Ah bookkeeping restarts here and only here.
    ctx.accumulated_ah = 0.0;
    ctx.at_target_ticks = 0;
    ctx.commands.led = LedPattern::SlowBlink;
    info!(
        "BULK: target {:.2} V, ceiling {:.0} mA",
        ctx.target_voltage_v, ctx.current_ceiling_ma
    );
}

fn bulk_update(ctx: &mut FsmContext) -> Option<StateId> {
    // Guard: any safety fault → Error
    if ctx.has_faults() {
        return Some(StateId::Error);
    }

    ctx.target_voltage_v = ctx.config.bulk_voltage_v;
    ctx.current_ceiling_ma = ctx.config.effective_max_ma();

    // Debounced "battery regulated to target" detection
    if ctx.sensors.battery_voltage_v >= ctx.config.bulk_voltage_v - VOLTAGE_REACHED_BAND_V {
        ctx.at_target_ticks += 1;
    } else {
        ctx.at_target_ticks = 0;
    }
    if ctx.at_target_ticks >= STAGE_DEBOUNCE_TICKS {
        info!(
            "BULK: held {:.2} V for {} ticks → absorption",
            ctx.sensors.battery_voltage_v, ctx.at_target_ticks
        );
        return Some(StateId::Absorption);
    }

    // Safety cap against indefinite bulk charging (weak sun, tired bank)
    if ctx.hours_in_state() >= ctx.config.max_bulk_hours {
        warn!(
            "BULK: {:.1} h cap reached without regulation → absorption",
            ctx.config.max_bulk_hours
        );
        return Some(StateId::Absorption);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ABSORPTION stage — hold voltage, let acceptance current taper
// ═══════════════════════════════════════════════════════════════════════════

fn absorption_enter(ctx: &mut FsmContext) {
    ctx.target_voltage_v = ctx.config.absorption_voltage_v;
    ctx.current_ceiling_ma = ctx
        .derived
        .absorption_threshold_ma
        .min(ctx.config.effective_max_ma());
    ctx.low_current_ticks = 0;
    ctx.absorption_budget_hours = absorption_budget_hours(ctx);
    ctx.commands.led = LedPattern::FastBlink;
    info!(
        "ABSORPTION: target {:.2} V, taper below {:.0} mA, budget {:.2} h",
        ctx.target_voltage_v, ctx.derived.absorption_threshold_ma, ctx.absorption_budget_hours
    );
}

fn absorption_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.has_faults() {
        return Some(StateId::Error);
    }

    ctx.target_voltage_v = ctx.config.absorption_voltage_v;
    ctx.current_ceiling_ma = ctx
        .derived
        .absorption_threshold_ma
        .min(ctx.config.effective_max_ma());

    // Battery nearly full: acceptance current tapers under the threshold
    if ctx.sensors.charge_current_ma < ctx.derived.absorption_threshold_ma {
        ctx.low_current_ticks += 1;
    } else {
        ctx.low_current_ticks = 0;
    }
    if ctx.low_current_ticks >= STAGE_DEBOUNCE_TICKS {
        info!(
            "ABSORPTION: current {:.0} mA under threshold for {} ticks → float",
            ctx.sensors.charge_current_ma, ctx.low_current_ticks
        );
        return Some(StateId::Float);
    }

    // Budget elapsed — stop holding the high voltage regardless of taper
    if ctx.hours_in_state() >= ctx.absorption_budget_hours {
        info!(
            "ABSORPTION: {:.2} h budget spent → float",
            ctx.absorption_budget_hours
        );
        return Some(StateId::Float);
    }

    None
}

/// Capacity-proportional absorption budget, clamped to the configured cap.
fn absorption_budget_hours(ctx: &FsmContext) -> f32 {
    let accept_a = ctx.derived.absorption_threshold_ma / 1000.0;
    if accept_a <= 0.0 {
        return MIN_ABSORPTION_HOURS;
    }
    let estimate = ctx.config.battery_capacity_ah / accept_a * 0.05;
    estimate.clamp(MIN_ABSORPTION_HOURS, ctx.config.max_absorption_hours)
}

// ═══════════════════════════════════════════════════════════════════════════
//  FLOAT stage — maintenance voltage, watching for discharge events
// ═══════════════════════════════════════════════════════════════════════════

fn float_enter(ctx: &mut FsmContext) {
    ctx.target_voltage_v = ctx.config.float_voltage_v;
    ctx.current_ceiling_ma = ctx.derived.float_limit_ma.min(ctx.config.effective_max_ma());
    ctx.sag_ticks = 0;
    ctx.commands.led = LedPattern::Solid;
    info!(
        "FLOAT: target {:.2} V, limit {:.0} mA",
        ctx.target_voltage_v, ctx.current_ceiling_ma
    );
}

fn float_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.has_faults() {
        return Some(StateId::Error);
    }

    ctx.target_voltage_v = ctx.config.float_voltage_v;
    ctx.current_ceiling_ma = ctx.derived.float_limit_ma.min(ctx.config.effective_max_ma());

    // Persistent sag below the recharge threshold = discharge event
    if ctx.sensors.battery_voltage_v < ctx.config.recharge_voltage_v {
        ctx.sag_ticks += 1;
    } else {
        ctx.sag_ticks = 0;
    }
    if ctx.sag_ticks >= STAGE_DEBOUNCE_TICKS {
        info!(
            "FLOAT: sagged to {:.2} V for {} ticks → restarting BULK cycle",
            ctx.sensors.battery_voltage_v, ctx.sag_ticks
        );
        return Some(StateId::Bulk);
    }

    // A load spike past the float limit also restarts the cycle
    if ctx.sensors.load_current_ma > ctx.derived.float_limit_ma {
        info!(
            "FLOAT: load spike {:.0} mA over {:.0} mA limit → restarting BULK cycle",
            ctx.sensors.load_current_ma, ctx.derived.float_limit_ma
        );
        return Some(StateId::Bulk);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR stage — charging disabled; load guard keeps running elsewhere
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut FsmContext) {
    // Kill the charging path immediately.  The load switch is governed
    // by the voltage guard alone and is deliberately untouched here.
    ctx.commands.charge_duty = 0;
    ctx.target_voltage_v = 0.0;
    ctx.current_ceiling_ma = 0.0;
    ctx.fault_clear_ticks = 0;
    ctx.commands.led = LedPattern::Off;
    warn!(
        "ERROR: charging disabled, fault_flags=0b{:08b}",
        ctx.fault_flags
    );
}

fn error_exit(ctx: &mut FsmContext) {
    info!(
        "ERROR: faults clear for {} ticks, restarting charge cycle",
        ctx.fault_clear_ticks
    );
}

fn error_update(ctx: &mut FsmContext) -> Option<StateId> {
    // Re-assert zero output every tick while faulted.
    ctx.commands.charge_duty = 0;
    ctx.target_voltage_v = 0.0;
    ctx.current_ceiling_ma = 0.0;

    if ctx.has_faults() {
        ctx.fault_clear_ticks = 0;
        return None;
    }

    ctx.fault_clear_ticks += 1;
    if ctx.fault_clear_ticks >= FAULT_CLEAR_TICKS {
        return Some(StateId::Bulk);
    }

    None
}

//! Low-voltage load-disconnect guard.
//!
//! Runs every tick, independent of the charge stage: a charging fault
//! never cuts the load, and a load disconnect never stops charging.
//!
//! Two mechanisms share the output switch:
//!
//! - **LVD/LVR hysteresis latch** — disconnect at or below the LVD
//!   voltage, reconnect only at or above LVR.  The deadband between the
//!   two stops the switch chattering around a single threshold.
//! - **Temporary off** — an operator-requested disconnect of 1–300 s.
//!   The load re-engages automatically when the timer expires, *unless*
//!   the LVD latch is asserted; the override never re-energises a load
//!   the voltage guard says must stay off.
//!
//! Time is an injected monotonic `now_ms`; all comparisons use
//! `wrapping_sub` so a counter rollover cannot wedge the timer.

use crate::config::ChargerConfig;
use log::{info, warn};

/// Bounds for a temporary-off request (seconds).
pub const TEMP_OFF_MIN_SECS: u16 = 1;
pub const TEMP_OFF_MAX_SECS: u16 = 300;

/// Result of a temporary-off request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempOffOutcome {
    /// Load switched off, timer started.
    Started,
    /// Load was already off (timer pending or LVD latched) — existing
    /// state reported, no timer restart.
    AlreadyOff,
    /// Duration outside 1–300 s.
    InvalidDuration,
}

#[derive(Debug, Clone, Copy)]
struct TempOff {
    started_ms: u32,
    duration_ms: u32,
}

/// The load-disconnect guard.
pub struct LoadGuard {
    load_on: bool,
    lvd_latched: bool,
    temp_off: Option<TempOff>,
}

impl LoadGuard {
    pub fn new() -> Self {
        Self {
            load_on: true,
            lvd_latched: false,
            temp_off: None,
        }
    }

    /// Evaluate the guard for this tick and return the load state.
    pub fn tick(&mut self, battery_v: f32, cfg: &ChargerConfig, now_ms: u32) -> bool {
        // Hysteresis latch.  NaN compares false on both branches, so an
        // implausible reading freezes the latch rather than toggling it;
        // the safety supervisor reports the sensor fault separately.
        if !self.lvd_latched && battery_v <= cfg.lvd_voltage_v {
            warn!(
                "LOADGUARD: battery {:.2} V <= LVD {:.2} V, disconnecting load",
                battery_v, cfg.lvd_voltage_v
            );
            self.lvd_latched = true;
        } else if self.lvd_latched && battery_v >= cfg.lvr_voltage_v {
            info!(
                "LOADGUARD: battery {:.2} V >= LVR {:.2} V, reconnect allowed",
                battery_v, cfg.lvr_voltage_v
            );
            self.lvd_latched = false;
        }

        // Temporary-off expiry.
        if let Some(t) = self.temp_off {
            if now_ms.wrapping_sub(t.started_ms) >= t.duration_ms {
                info!("LOADGUARD: temporary off expired");
                self.temp_off = None;
            }
        }

        self.load_on = !self.lvd_latched && self.temp_off.is_none();
        self.load_on
    }

    /// Operator request: disconnect the load for `secs` seconds.
    pub fn request_temp_off(&mut self, secs: u16, now_ms: u32) -> TempOffOutcome {
        if !(TEMP_OFF_MIN_SECS..=TEMP_OFF_MAX_SECS).contains(&secs) {
            return TempOffOutcome::InvalidDuration;
        }
        if !self.load_on {
            // Already off — report, never silently restart a timer.
            return TempOffOutcome::AlreadyOff;
        }

        self.temp_off = Some(TempOff {
            started_ms: now_ms,
            duration_ms: u32::from(secs) * 1000,
        });
        self.load_on = false;
        info!("LOADGUARD: temporary off for {secs} s");
        TempOffOutcome::Started
    }

    /// Cancel a pending temporary off.  Returns `true` if one was
    /// pending; the load re-engages on the next tick unless LVD holds.
    pub fn cancel_temp_off(&mut self) -> bool {
        if self.temp_off.take().is_some() {
            info!("LOADGUARD: temporary off cancelled");
            true
        } else {
            false
        }
    }

    /// Current load switch state.
    pub fn is_load_on(&self) -> bool {
        self.load_on
    }

    /// Whether the LVD latch is asserted.
    pub fn lvd_latched(&self) -> bool {
        self.lvd_latched
    }

    /// Seconds left on the temporary-off timer (0 when idle).
    pub fn temp_off_remaining_secs(&self, now_ms: u32) -> u32 {
        match self.temp_off {
            Some(t) => {
                let elapsed = now_ms.wrapping_sub(t.started_ms);
                t.duration_ms.saturating_sub(elapsed).div_ceil(1000)
            }
            None => 0,
        }
    }
}

impl Default for LoadGuard {
    fn default() -> Self {
        Self::new()
    }
}

//! Incremental PWM duty regulator for the charging path.
//!
//! Each tick the regulator nudges the duty value toward the active
//! stage's voltage target while respecting its current ceiling:
//!
//! - battery below target *and* current under ceiling → step up
//! - battery over target *or* current over ceiling → step down
//!
//! Steps are bounded per tick so the converter never slews hard, and
//! the duty is clamped to `0..=DUTY_MAX` (anti-windup).  The ERROR
//! stage bypasses the loop entirely via [`DutyRegulator::force_zero`].

/// Full-scale duty for the 12-bit LEDC timer.
pub const DUTY_MAX: u16 = 4095;

/// Largest per-tick duty change.
pub const MAX_STEP: u16 = 64;

/// Voltage error that saturates the step size.
const VOLTS_PER_FULL_STEP: f32 = 0.16;

/// Hold band around the target to keep the output from hunting.
const VOLTAGE_DEADBAND_V: f32 = 0.02;

/// Closed-loop duty regulator.  Owns nothing but the current duty.
pub struct DutyRegulator {
    duty: u16,
}

impl DutyRegulator {
    pub fn new() -> Self {
        Self { duty: 0 }
    }

    /// Current duty value (0..=DUTY_MAX).
    pub fn duty(&self) -> u16 {
        self.duty
    }

    /// Drop the output to zero immediately.  Used on ERROR entry and
    /// every tick spent there.
    pub fn force_zero(&mut self) -> u16 {
        self.duty = 0;
        self.duty
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        self.duty = 0;
    }

    /// Advance the loop by one tick and return the new duty.
    ///
    /// `target_v`/`ceiling_ma` come from the active stage handler;
    /// `battery_v`/`charge_ma` from the sensor snapshot.
    pub fn update(
        &mut self,
        target_v: f32,
        ceiling_ma: f32,
        battery_v: f32,
        charge_ma: f32,
    ) -> u16 {
        let over_voltage = battery_v > target_v + VOLTAGE_DEADBAND_V;
        let under_voltage = battery_v < target_v - VOLTAGE_DEADBAND_V;
        let over_current = charge_ma > ceiling_ma;

        if over_voltage || over_current {
            // Over-current backs off at the full step; over-voltage in
            // proportion to how far past the target we are.
            let step = if over_current {
                MAX_STEP
            } else {
                step_for(battery_v - target_v)
            };
            self.duty = self.duty.saturating_sub(step);
        } else if under_voltage {
            let step = step_for(target_v - battery_v);
            self.duty = (self.duty + step).min(DUTY_MAX);
        }

        self.duty
    }
}

impl Default for DutyRegulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Error-proportional step, clamped to `1..=MAX_STEP`.
fn step_for(error_v: f32) -> u16 {
    let scaled = (error_v / VOLTS_PER_FULL_STEP) * f32::from(MAX_STEP);
    (scaled as u16).clamp(1, MAX_STEP)
}

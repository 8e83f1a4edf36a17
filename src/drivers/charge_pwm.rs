//! Charge-path PWM driver (high-side MOSFET gate).
//!
//! The duty regulator decides the value; this driver pushes it to the
//! 12-bit LEDC channel and remembers the last commanded duty.
//!
//! ## Safety contract
//!
//! Duty 0 must always mean "no charge current".  The safety supervisor
//! forces 0 on any fault; this driver is a dumb actuator and performs
//! no policy of its own beyond clamping to the timer resolution.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the real LEDC channel via hw_init helpers.
//! On host/test: tracks state in-memory only.

use crate::control::regulator::DUTY_MAX;
use crate::drivers::hw_init;

pub struct ChargePwm {
    duty: u16,
}

impl ChargePwm {
    pub fn new() -> Self {
        Self { duty: 0 }
    }

    /// Push a new duty value (clamped to 0–4095) to the gate driver.
    pub fn set_duty(&mut self, duty: u16) {
        let duty = duty.min(DUTY_MAX);
        hw_init::ledc_set(hw_init::LEDC_CH_CHARGE, duty);
        self.duty = duty;
    }

    pub fn off(&mut self) {
        self.set_duty(0);
    }

    pub fn current_duty(&self) -> u16 {
        self.duty
    }
}

impl Default for ChargePwm {
    fn default() -> Self {
        Self::new()
    }
}

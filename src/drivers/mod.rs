//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod charge_pwm;
pub mod hw_init;
pub mod hw_timer;
pub mod load_switch;
pub mod status_led;
pub mod watchdog;

//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and all actuator drivers, exposing them
//! through [`SensorPort`] and [`ActuatorPort`].  This is the only
//! module in the system that touches actual hardware.  On non-espidf
//! targets, the underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::charge_pwm::ChargePwm;
use crate::drivers::load_switch::LoadSwitch;
use crate::drivers::status_led::StatusLed;
use crate::fsm::context::{LedPattern, SensorSnapshot};
use crate::sensors::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    sensor_hub: SensorHub,
    charge: ChargePwm,
    load: LoadSwitch,
    led: StatusLed,
}

impl HardwareAdapter {
    pub fn new(
        sensor_hub: SensorHub,
        charge: ChargePwm,
        load: LoadSwitch,
        led: StatusLed,
    ) -> Self {
        Self {
            sensor_hub,
            charge,
            load,
            led,
        }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn read_all(&mut self) -> SensorSnapshot {
        self.sensor_hub.read_all()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_charge_duty(&mut self, duty: u16) {
        self.charge.set_duty(duty);
    }

    fn set_load(&mut self, on: bool) {
        self.load.set(on);
    }

    /// Called exactly once per control tick, so the tick doubles as the
    /// LED blink clock.
    fn set_led(&mut self, pattern: LedPattern) {
        self.led.set_pattern(pattern);
        self.led.tick();
    }

    fn all_off(&mut self) {
        self.charge.off();
        self.load.set(false);
        self.led.off();
    }
}

//! Sensor subsystem — individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor driver and produces a [`SensorSnapshot`] each
//! tick that gets written into `FsmContext.sensors`.

pub mod power;
pub mod temperature;

use crate::fsm::context::SensorSnapshot;
use power::PowerMonitor;
use temperature::TemperatureSensor;

/// Aggregates all sensor drivers and produces a unified snapshot.
pub struct SensorHub {
    pub power: PowerMonitor,
    pub temperature: TemperatureSensor,
}

impl SensorHub {
    /// Construct a new hub.  Pass in pre-built drivers (built in main
    /// where peripheral ownership is established).
    pub fn new(power: PowerMonitor, temperature: TemperatureSensor) -> Self {
        Self { power, temperature }
    }

    /// Read every sensor and return a unified snapshot.
    ///
    /// Values are calibrated here but not sanity-checked; the safety
    /// supervisor decides what counts as implausible, so a broken channel
    /// flows through as-is (NaN included) instead of being papered over.
    pub fn read_all(&mut self) -> SensorSnapshot {
        let power = self.power.read();
        let temp = self.temperature.read();

        SensorSnapshot {
            panel_voltage_v: power.panel_voltage_v,
            battery_voltage_v: power.battery_voltage_v,
            charge_current_ma: power.charge_current_ma,
            load_current_ma: power.load_current_ma,
            temperature_c: temp.celsius,
        }
    }
}

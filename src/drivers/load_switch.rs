//! Load output switch driver (low-side MOSFET).
//!
//! HIGH = load connected.  The LVD guard decides when to open or close
//! this switch; the driver only executes and tracks the last state.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the real GPIO via hw_init helpers.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::pins;

pub struct LoadSwitch {
    on: bool,
}

impl LoadSwitch {
    /// The load ships connected at boot, matching the hw_init default
    /// GPIO level.
    pub fn new() -> Self {
        Self { on: true }
    }

    pub fn set(&mut self, on: bool) {
        hw_init::gpio_write(pins::LOAD_SWITCH_GPIO, on);
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl Default for LoadSwitch {
    fn default() -> Self {
        Self::new()
    }
}

//! Status LED driver.
//!
//! A single discrete LED signals the charge stage.  The FSM picks a
//! [`LedPattern`]; this driver turns pattern + control-tick cadence into
//! GPIO levels.
//!
//! At the 1 Hz control tick:
//! - `Off`       — dark (ERROR, handled alongside the fault flags)
//! - `Solid`     — lit (FLOAT, battery full)
//! - `SlowBlink` — toggles every second tick (BULK)
//! - `FastBlink` — toggles every tick (ABSORPTION)
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the LED GPIO via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::fsm::context::LedPattern;
use crate::pins;

pub struct StatusLed {
    pattern: LedPattern,
    phase: u8,
    lit: bool,
}

impl StatusLed {
    pub fn new() -> Self {
        Self {
            pattern: LedPattern::Off,
            phase: 0,
            lit: false,
        }
    }

    /// Select the active pattern.  Resets the blink phase on change so a
    /// new pattern starts from its bright half.
    pub fn set_pattern(&mut self, pattern: LedPattern) {
        if pattern != self.pattern {
            self.pattern = pattern;
            self.phase = 0;
        }
    }

    /// Advance one control tick and drive the GPIO.
    pub fn tick(&mut self) {
        let lit = match self.pattern {
            LedPattern::Off => false,
            LedPattern::Solid => true,
            LedPattern::SlowBlink => (self.phase / 2) % 2 == 0,
            LedPattern::FastBlink => self.phase % 2 == 0,
        };
        self.phase = self.phase.wrapping_add(1);

        if lit != self.lit {
            hw_init::gpio_write(pins::STATUS_LED_GPIO, lit);
            self.lit = lit;
        }
    }

    pub fn off(&mut self) {
        self.pattern = LedPattern::Off;
        self.phase = 0;
        if self.lit {
            hw_init::gpio_write(pins::STATUS_LED_GPIO, false);
            self.lit = false;
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn pattern(&self) -> LedPattern {
        self.pattern
    }
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(led: &mut StatusLed, ticks: usize) -> Vec<bool> {
        (0..ticks)
            .map(|_| {
                led.tick();
                led.is_lit()
            })
            .collect()
    }

    #[test]
    fn solid_stays_lit() {
        let mut led = StatusLed::new();
        led.set_pattern(LedPattern::Solid);
        assert_eq!(run(&mut led, 4), vec![true, true, true, true]);
    }

    #[test]
    fn fast_blink_toggles_every_tick() {
        let mut led = StatusLed::new();
        led.set_pattern(LedPattern::FastBlink);
        assert_eq!(run(&mut led, 4), vec![true, false, true, false]);
    }

    #[test]
    fn slow_blink_holds_two_ticks_per_half() {
        let mut led = StatusLed::new();
        led.set_pattern(LedPattern::SlowBlink);
        assert_eq!(run(&mut led, 8), vec![true, true, false, false, true, true, false, false]);
    }

    #[test]
    fn pattern_change_restarts_bright() {
        let mut led = StatusLed::new();
        led.set_pattern(LedPattern::FastBlink);
        led.tick();
        led.tick(); // currently dark
        assert!(!led.is_lit());

        led.set_pattern(LedPattern::SlowBlink);
        led.tick();
        assert!(led.is_lit());
    }

    #[test]
    fn off_goes_dark_immediately() {
        let mut led = StatusLed::new();
        led.set_pattern(LedPattern::Solid);
        led.tick();
        assert!(led.is_lit());
        led.off();
        assert!(!led.is_lit());
    }
}

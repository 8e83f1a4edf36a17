//! GPIO / peripheral pin assignments for the charge controller board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Sensors — Analog (ADC1)
// ---------------------------------------------------------------------------

/// Panel/source voltage — 100 kΩ : 10 kΩ divider (÷11, ~36 V full scale).
/// ADC1 channel 0 (GPIO 1 on ESP32-S3).
pub const PANEL_V_ADC_GPIO: i32 = 1;

/// Battery voltage — 47 kΩ : 10 kΩ divider (÷5.7, ~18.8 V full scale).
/// ADC1 channel 1 (GPIO 2 on ESP32-S3).
pub const BATTERY_V_ADC_GPIO: i32 = 2;

/// NTC thermistor — 10 kΩ @ 25 °C, voltage-divider to ADC.
/// ADC1 channel 3 (GPIO 4 on ESP32-S3).
pub const TEMP_ADC_GPIO: i32 = 4;

/// Charge-path hall current sensor — 100 mV/A, centred at VREF/2.
/// ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const CHARGE_I_ADC_GPIO: i32 = 5;

/// Load-path hall current sensor — 100 mV/A, centred at VREF/2.
/// ADC1 channel 5 (GPIO 6 on ESP32-S3).
pub const LOAD_I_ADC_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// Charge path (high-side MOSFET, PWM controlled)
// ---------------------------------------------------------------------------

/// LEDC PWM output to the charge MOSFET gate driver.
pub const CHARGE_PWM_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// Load path (low-side MOSFET switch)
// ---------------------------------------------------------------------------

/// Digital output: HIGH = load connected.  The LVD guard owns this.
pub const LOAD_SWITCH_GPIO: i32 = 7;

// ---------------------------------------------------------------------------
// Status LED (single discrete LED, pattern-blinked)
// ---------------------------------------------------------------------------

pub const STATUS_LED_GPIO: i32 = 3;

// ---------------------------------------------------------------------------
// UART console
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  12-bit gives 0 – 4095 duty levels to
/// match the regulator's full duty range.
pub const PWM_RESOLUTION_BITS: u32 = 12;
/// LEDC base frequency for the charge MOSFET (5 kHz — within the gate
/// driver's slew budget at 12-bit resolution).
pub const CHARGE_PWM_FREQ_HZ: u32 = 5_000;

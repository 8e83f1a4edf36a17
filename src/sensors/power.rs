//! Panel/battery voltage and charge/load current acquisition.
//!
//! Voltages come in through resistor dividers, currents through
//! bidirectional hall-effect sensors centred at half rail, all read via
//! the ESP32-S3 ADC. This module only applies per-channel calibration;
//! plausibility policing is the safety supervisor's job.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from static AtomicU16s for injection.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

// Current channels default to midpoint = 0 mA so a fresh sim boots idle.
static SIM_PANEL_ADC: AtomicU16 = AtomicU16::new(0);
static SIM_BATTERY_ADC: AtomicU16 = AtomicU16::new(0);
static SIM_CHARGE_ADC: AtomicU16 = AtomicU16::new(2048);
static SIM_LOAD_ADC: AtomicU16 = AtomicU16::new(2048);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_panel_adc(raw: u16) {
    SIM_PANEL_ADC.store(raw, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_battery_adc(raw: u16) {
    SIM_BATTERY_ADC.store(raw, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_charge_adc(raw: u16) {
    SIM_CHARGE_ADC.store(raw, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_load_adc(raw: u16) {
    SIM_LOAD_ADC.store(raw, Ordering::Relaxed);
}

const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// Panel divider 100 kOhm : 10 kOhm (full scale ~36 V).
const PANEL_DIVIDER_RATIO: f32 = 11.0;
/// Battery divider 47 kOhm : 10 kOhm (full scale ~18.8 V).
const BATTERY_DIVIDER_RATIO: f32 = 5.7;
/// Hall sensor gain, 100 mV per A, output centred at V_REF / 2.
const CURRENT_SENSE_V_PER_A: f32 = 0.100;
const CURRENT_MID_V: f32 = V_REF / 2.0;

#[derive(Debug, Clone, Copy)]
pub struct PowerReading {
    pub panel_voltage_v: f32,
    pub battery_voltage_v: f32,
    pub charge_current_ma: f32,
    pub load_current_ma: f32,
}

/// Reads the four power channels.  Channel-to-pin mapping is fixed in
/// hw_init, so there is nothing to configure per instance.
pub struct PowerMonitor;

impl PowerMonitor {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self) -> PowerReading {
        PowerReading {
            panel_voltage_v: divider_volts(self.read_panel_adc(), PANEL_DIVIDER_RATIO),
            battery_voltage_v: divider_volts(self.read_battery_adc(), BATTERY_DIVIDER_RATIO),
            charge_current_ma: sense_current_ma(self.read_charge_adc()),
            load_current_ma: sense_current_ma(self.read_load_adc()),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_panel_adc(&self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_PANEL_V)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_panel_adc(&self) -> u16 {
        SIM_PANEL_ADC.load(Ordering::Relaxed)
    }

    #[cfg(target_os = "espidf")]
    fn read_battery_adc(&self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_BATTERY_V)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_battery_adc(&self) -> u16 {
        SIM_BATTERY_ADC.load(Ordering::Relaxed)
    }

    #[cfg(target_os = "espidf")]
    fn read_charge_adc(&self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_CHARGE_I)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_charge_adc(&self) -> u16 {
        SIM_CHARGE_ADC.load(Ordering::Relaxed)
    }

    #[cfg(target_os = "espidf")]
    fn read_load_adc(&self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_LOAD_I)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_load_adc(&self) -> u16 {
        SIM_LOAD_ADC.load(Ordering::Relaxed)
    }
}

impl Default for PowerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn raw_to_volts(raw: u16) -> f32 {
    (raw as f32 / ADC_MAX) * V_REF
}

fn divider_volts(raw: u16, ratio: f32) -> f32 {
    raw_to_volts(raw) * ratio
}

fn sense_current_ma(raw: u16) -> f32 {
    ((raw_to_volts(raw) - CURRENT_MID_V) / CURRENT_SENSE_V_PER_A) * 1000.0
}

/// Inverse of the battery divider conversion, for tests and the host sim
/// that want to inject a target voltage rather than a raw count.
#[cfg(not(target_os = "espidf"))]
pub fn battery_volts_to_raw(volts: f32) -> u16 {
    ((volts / BATTERY_DIVIDER_RATIO) / V_REF * ADC_MAX).clamp(0.0, ADC_MAX) as u16
}

/// Inverse of the current-sense conversion, same purpose as
/// [`battery_volts_to_raw`].
#[cfg(not(target_os = "espidf"))]
pub fn current_ma_to_raw(ma: f32) -> u16 {
    let volts = CURRENT_MID_V + (ma / 1000.0) * CURRENT_SENSE_V_PER_A;
    (volts / V_REF * ADC_MAX).clamp(0.0, ADC_MAX) as u16
}

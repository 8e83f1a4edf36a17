//! NTC thermistor temperature sensing (10 kOhm @ 25 C, B = 3984).
//!
//! Wired in a voltage-divider against a fixed 10 kOhm series resistor,
//! read via the ESP32-S3 ADC with 20-sample oversampling. The simplified
//! Beta (Steinhart-Hart) equation converts divider resistance to
//! temperature.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static AtomicU16 for injection.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

static SIM_TEMP_ADC: AtomicU16 = AtomicU16::new(2048);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temp_adc(raw: u16) {
    SIM_TEMP_ADC.store(raw, Ordering::Relaxed);
}

const R25: f32 = 10_000.0;
const BETA: f32 = 3984.0;
const T25_K: f32 = 298.15;
const R_SERIES: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;
const NUM_SAMPLES: u32 = 20;

#[derive(Debug, Clone, Copy)]
pub struct TemperatureReading {
    pub raw: u16,
    pub celsius: f32,
}

pub struct TemperatureSensor {
    _adc_gpio: i32,
}

impl TemperatureSensor {
    pub fn new(adc_gpio: i32) -> Self {
        Self {
            _adc_gpio: adc_gpio,
        }
    }

    pub fn read(&self) -> TemperatureReading {
        let raw = self.read_adc_oversampled();
        TemperatureReading {
            raw,
            celsius: adc_to_celsius(raw),
        }
    }

    /// Average NUM_SAMPLES conversions to knock down ADC noise.
    fn read_adc_oversampled(&self) -> u16 {
        let mut sum: u32 = 0;
        for _ in 0..NUM_SAMPLES {
            sum += u32::from(self.read_adc());
        }
        (sum / NUM_SAMPLES) as u16
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_TEMP)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_TEMP_ADC.load(Ordering::Relaxed)
    }
}

/// Beta-equation conversion.  A reading pinned to either ADC rail means
/// the thermistor is open or shorted; NaN is returned so the safety
/// supervisor flags a SensorFault instead of acting on a fabricated
/// temperature.
fn adc_to_celsius(raw: u16) -> f32 {
    let voltage = (raw as f32 / ADC_MAX) * V_REF;
    if voltage <= 0.01 || voltage >= (V_REF - 0.01) {
        return f32::NAN;
    }
    let r_ntc = R_SERIES * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return f32::NAN;
    }
    (1.0 / inv_t) - 273.15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_reads_25c() {
        // 2048/4095 * 3.3 V across a perfectly balanced divider = R25.
        let c = adc_to_celsius(2048);
        assert!((c - 25.0).abs() < 0.1, "got {c}");
    }

    #[test]
    fn hotter_thermistor_reads_lower_adc() {
        // NTC: resistance falls with temperature, so the divider tap
        // (thermistor on the low side) drops as it heats up.
        let cold = adc_to_celsius(3000);
        let hot = adc_to_celsius(1000);
        assert!(hot > cold, "hot={hot} cold={cold}");
    }

    #[test]
    fn rail_readings_are_nan() {
        assert!(adc_to_celsius(0).is_nan());
        assert!(adc_to_celsius(4095).is_nan());
    }

    #[test]
    fn oversampled_read_matches_injected_raw() {
        sim_set_temp_adc(1234);
        let sensor = TemperatureSensor::new(4);
        let reading = sensor.read();
        assert_eq!(reading.raw, 1234);
        sim_set_temp_adc(2048);
    }
}

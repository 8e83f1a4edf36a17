//! Charger configuration parameters
//!
//! All tunable parameters for the SunGuard charge controller.
//! Values persist in NVS and can be replaced at runtime via the serial
//! console; a replacement is validated wholesale before it reaches the
//! control loop, so the loop only ever sees a self-consistent config.

use crate::app::ports::ConfigError;
use serde::{Deserialize, Serialize};

/// Control loop cadence.  Stage timers, debounce counters, and the
/// amp-hour integrator all assume this period.
pub const TICK_PERIOD_MS: u32 = 1000;

/// Core charger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerConfig {
    // --- Battery ---
    /// Battery bank capacity in amp-hours
    pub battery_capacity_ah: f32,
    /// Absorption acceptance threshold as a percentage of capacity
    pub charge_threshold_pct: f32,
    /// Lithium voltage curve instead of lead-acid/GEL
    pub lithium_mode: bool,

    // --- Charge stages ---
    /// BULK stage target voltage (V)
    pub bulk_voltage_v: f32,
    /// ABSORPTION stage target voltage (V)
    pub absorption_voltage_v: f32,
    /// FLOAT stage target voltage (V)
    pub float_voltage_v: f32,
    /// Battery voltage below which FLOAT restarts a BULK cycle (V)
    pub recharge_voltage_v: f32,

    // --- Current limits ---
    /// Maximum allowed charging current (mA)
    pub max_charge_current_ma: u16,
    /// Divisor applied to the absorption threshold to get the FLOAT
    /// stage current limit
    pub factor_divider: u8,

    // --- Source ---
    /// Charging from a bench DC supply instead of a solar panel
    pub dc_source_active: bool,
    /// Rated output current of the DC supply (A)
    pub dc_source_rated_a: f32,

    // --- Load guard ---
    /// Low-voltage disconnect threshold (V)
    pub lvd_voltage_v: f32,
    /// Low-voltage reconnect threshold (V), must exceed LVD
    pub lvr_voltage_v: f32,

    // --- Stage time caps ---
    /// Hard cap on time spent in BULK (hours)
    pub max_bulk_hours: f32,
    /// Cap on the computed absorption duration budget (hours)
    pub max_absorption_hours: f32,

    // --- Misc ---
    /// Free-form operator note shown in telemetry
    pub note: heapless::String<64>,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            // Battery: 100 Ah lead-acid bank, 1% acceptance
            battery_capacity_ah: 100.0,
            charge_threshold_pct: 1.0,
            lithium_mode: false,

            // Stage voltages for a 12 V nominal bank
            bulk_voltage_v: 14.4,
            absorption_voltage_v: 14.4,
            float_voltage_v: 13.5,
            recharge_voltage_v: 12.6,

            // Current
            max_charge_current_ma: 10_000, // 10 A
            factor_divider: 5,

            // Solar by default
            dc_source_active: false,
            dc_source_rated_a: 10.0,

            // Load guard deadband 12.0 → 12.5 V
            lvd_voltage_v: 12.0,
            lvr_voltage_v: 12.5,

            // Time caps
            max_bulk_hours: 8.0,
            max_absorption_hours: 2.0,

            note: heapless::String::new(),
        }
    }
}

impl ChargerConfig {
    /// Effective charging-current ceiling (mA).
    ///
    /// A bench DC supply with a rated output below the configured
    /// maximum lowers the ceiling to the supply's capability.
    pub fn effective_max_ma(&self) -> f32 {
        let max_ma = f32::from(self.max_charge_current_ma);
        if self.dc_source_active {
            max_ma.min(self.dc_source_rated_a * 1000.0)
        } else {
            max_ma
        }
    }
}

/// Current thresholds derived from the active configuration.
///
/// Recomputed every time the configuration is replaced; never cached
/// across a config update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedThresholds {
    /// Charging current (mA) below which ABSORPTION hands off to FLOAT
    pub absorption_threshold_ma: f32,
    /// Load/charge current (mA) above which FLOAT restarts BULK
    pub float_limit_ma: f32,
}

impl DerivedThresholds {
    pub fn from_config(cfg: &ChargerConfig) -> Self {
        let absorption_threshold_ma =
            cfg.battery_capacity_ah * cfg.charge_threshold_pct * 10.0;
        Self {
            absorption_threshold_ma,
            float_limit_ma: absorption_threshold_ma / f32::from(cfg.factor_divider.max(1)),
        }
    }
}

/// Validate a configuration wholesale.
///
/// Every entry point that can introduce a config (NVS load, console
/// SET, persistence) calls this; a rejected config leaves the previous
/// one in effect.
pub fn validate_config(cfg: &ChargerConfig) -> Result<(), ConfigError> {
    if !(cfg.battery_capacity_ah > 0.0 && cfg.battery_capacity_ah <= 1000.0) {
        return Err(ConfigError::ValidationFailed(
            "battery_capacity_ah must be 0–1000",
        ));
    }
    if !(0.1..=5.0).contains(&cfg.charge_threshold_pct) {
        return Err(ConfigError::ValidationFailed(
            "charge_threshold_pct must be 0.1–5.0",
        ));
    }
    if !(1000..=15000).contains(&cfg.max_charge_current_ma) {
        return Err(ConfigError::ValidationFailed(
            "max_charge_current_ma must be 1000–15000",
        ));
    }
    if !(12.0..=15.0).contains(&cfg.bulk_voltage_v) {
        return Err(ConfigError::ValidationFailed(
            "bulk_voltage_v must be 12.0–15.0",
        ));
    }
    if !(12.0..=15.0).contains(&cfg.absorption_voltage_v) {
        return Err(ConfigError::ValidationFailed(
            "absorption_voltage_v must be 12.0–15.0",
        ));
    }
    if !(12.0..=15.0).contains(&cfg.float_voltage_v) {
        return Err(ConfigError::ValidationFailed(
            "float_voltage_v must be 12.0–15.0",
        ));
    }
    if cfg.float_voltage_v > cfg.absorption_voltage_v {
        return Err(ConfigError::ValidationFailed(
            "float_voltage_v must not exceed absorption_voltage_v",
        ));
    }
    if !(10.0..=14.0).contains(&cfg.recharge_voltage_v) {
        return Err(ConfigError::ValidationFailed(
            "recharge_voltage_v must be 10.0–14.0",
        ));
    }
    if cfg.recharge_voltage_v >= cfg.float_voltage_v {
        return Err(ConfigError::ValidationFailed(
            "recharge_voltage_v must be below float_voltage_v",
        ));
    }
    if !(0.0..=50.0).contains(&cfg.dc_source_rated_a) {
        return Err(ConfigError::ValidationFailed(
            "dc_source_rated_a must be 0.0–50.0",
        ));
    }
    if !(10.0..=13.0).contains(&cfg.lvd_voltage_v) {
        return Err(ConfigError::ValidationFailed(
            "lvd_voltage_v must be 10.0–13.0",
        ));
    }
    if !(11.0..=14.0).contains(&cfg.lvr_voltage_v) {
        return Err(ConfigError::ValidationFailed(
            "lvr_voltage_v must be 11.0–14.0",
        ));
    }
    if cfg.lvr_voltage_v <= cfg.lvd_voltage_v {
        return Err(ConfigError::ValidationFailed(
            "lvr_voltage_v must be above lvd_voltage_v",
        ));
    }
    if !(0.5..=24.0).contains(&cfg.max_bulk_hours) {
        return Err(ConfigError::ValidationFailed(
            "max_bulk_hours must be 0.5–24.0",
        ));
    }
    if !(0.1..=10.0).contains(&cfg.max_absorption_hours) {
        return Err(ConfigError::ValidationFailed(
            "max_absorption_hours must be 0.1–10.0",
        ));
    }
    if !(1..=10).contains(&cfg.factor_divider) {
        return Err(ConfigError::ValidationFailed(
            "factor_divider must be 1–10",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = ChargerConfig::default();
        assert!(validate_config(&c).is_ok());
        assert!(c.lvr_voltage_v > c.lvd_voltage_v);
        assert!(c.float_voltage_v <= c.absorption_voltage_v);
        assert!(c.recharge_voltage_v < c.float_voltage_v);
        assert!(c.battery_capacity_ah > 0.0);
    }

    #[test]
    fn derived_thresholds_scale_with_capacity() {
        // 50 Ah at 1% acceptance → 500 mA handoff, ÷5 → 100 mA float limit
        let cfg = ChargerConfig {
            battery_capacity_ah: 50.0,
            charge_threshold_pct: 1.0,
            factor_divider: 5,
            ..Default::default()
        };
        let d = DerivedThresholds::from_config(&cfg);
        assert!((d.absorption_threshold_ma - 500.0).abs() < 0.001);
        assert!((d.float_limit_ma - 100.0).abs() < 0.001);
    }

    #[test]
    fn derived_thresholds_survive_divider_floor() {
        let cfg = ChargerConfig {
            factor_divider: 0, // never passes validation, but derive must not divide by zero
            ..Default::default()
        };
        let d = DerivedThresholds::from_config(&cfg);
        assert!(d.float_limit_ma.is_finite());
    }

    #[test]
    fn dc_source_lowers_current_ceiling() {
        let mut cfg = ChargerConfig::default();
        cfg.max_charge_current_ma = 10_000;
        cfg.dc_source_active = true;
        cfg.dc_source_rated_a = 5.0;
        assert!((cfg.effective_max_ma() - 5_000.0).abs() < 0.001);

        // A beefier supply than the configured max changes nothing
        cfg.dc_source_rated_a = 20.0;
        assert!((cfg.effective_max_ma() - 10_000.0).abs() < 0.001);

        // Solar mode ignores the supply rating entirely
        cfg.dc_source_active = false;
        cfg.dc_source_rated_a = 1.0;
        assert!((cfg.effective_max_ma() - 10_000.0).abs() < 0.001);
    }

    #[test]
    fn rejects_lvr_at_or_below_lvd() {
        let cfg = ChargerConfig {
            lvd_voltage_v: 12.0,
            lvr_voltage_v: 12.0,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_float_above_absorption() {
        let cfg = ChargerConfig {
            absorption_voltage_v: 13.8,
            float_voltage_v: 14.2,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_capacity_out_of_range() {
        let cfg = ChargerConfig {
            battery_capacity_ah: 1500.0,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());

        let cfg = ChargerConfig {
            battery_capacity_ah: 0.0,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_recharge_at_or_above_float() {
        let cfg = ChargerConfig {
            float_voltage_v: 13.5,
            recharge_voltage_v: 13.5,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_max_current_out_of_range() {
        let cfg = ChargerConfig {
            max_charge_current_ma: 500,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());

        let cfg = ChargerConfig {
            max_charge_current_ma: 20_000,
            ..Default::default()
        };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let c = ChargerConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: ChargerConfig = serde_json::from_str(&json).unwrap();
        assert!((c.bulk_voltage_v - c2.bulk_voltage_v).abs() < 0.001);
        assert_eq!(c.max_charge_current_ma, c2.max_charge_current_ma);
        assert_eq!(c.lithium_mode, c2.lithium_mode);
    }

    #[test]
    fn postcard_roundtrip() {
        let mut c = ChargerConfig::default();
        c.note = heapless::String::try_from("north roof array").unwrap();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: ChargerConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.factor_divider, c2.factor_divider);
        assert!((c.lvd_voltage_v - c2.lvd_voltage_v).abs() < 0.001);
        assert_eq!(c.note, c2.note);
    }
}

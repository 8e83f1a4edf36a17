//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the serial
//! console today, the web dashboard behind it) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.
//! The console codec parses wire lines into this type; keeping parsing
//! separate from execution makes the parser a self-contained fuzz target.

use crate::config::ChargerConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// `CMD:GET_DATA` — full telemetry snapshot.
    GetData,

    /// `CMD:GET_CONFIG` — live configuration dump.
    GetConfig,

    /// `CMD:SET_<FIELD>:<value>` — single-field configuration update.
    /// Applied as a wholesale replacement: the live config is cloned,
    /// the field changed, the result validated, and only then swapped in.
    Set(ConfigUpdate),

    /// `CMD:TOGGLE_LOAD:<secs>` — disconnect the load for 1–300 seconds.
    ToggleLoad(u32),

    /// `CMD:CANCEL_TEMP_OFF` — cancel an active temporary disconnect.
    CancelTempOff,

    /// `CMD:GET_CRASH_LOG` — stored crash records.
    GetCrashLog,
}

/// One configuration field update, parsed and typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    BatteryCapacityAh(f32),
    ChargeThresholdPct(f32),
    LithiumMode(bool),
    BulkVoltage(f32),
    AbsorptionVoltage(f32),
    FloatVoltage(f32),
    RechargeVoltage(f32),
    MaxChargeCurrentMa(u16),
    FactorDivider(u8),
    DcSourceActive(bool),
    DcSourceRatedA(f32),
    LvdVoltage(f32),
    LvrVoltage(f32),
    MaxBulkHours(f32),
    MaxAbsorptionHours(f32),
    Note(heapless::String<64>),
}

impl ConfigUpdate {
    /// Write this update into `cfg`.  The caller validates the result
    /// before letting it anywhere near the control loop.
    pub fn apply_to(&self, cfg: &mut ChargerConfig) {
        match self {
            Self::BatteryCapacityAh(v) => cfg.battery_capacity_ah = *v,
            Self::ChargeThresholdPct(v) => cfg.charge_threshold_pct = *v,
            Self::LithiumMode(v) => cfg.lithium_mode = *v,
            Self::BulkVoltage(v) => cfg.bulk_voltage_v = *v,
            Self::AbsorptionVoltage(v) => cfg.absorption_voltage_v = *v,
            Self::FloatVoltage(v) => cfg.float_voltage_v = *v,
            Self::RechargeVoltage(v) => cfg.recharge_voltage_v = *v,
            Self::MaxChargeCurrentMa(v) => cfg.max_charge_current_ma = *v,
            Self::FactorDivider(v) => cfg.factor_divider = *v,
            Self::DcSourceActive(v) => cfg.dc_source_active = *v,
            Self::DcSourceRatedA(v) => cfg.dc_source_rated_a = *v,
            Self::LvdVoltage(v) => cfg.lvd_voltage_v = *v,
            Self::LvrVoltage(v) => cfg.lvr_voltage_v = *v,
            Self::MaxBulkHours(v) => cfg.max_bulk_hours = *v,
            Self::MaxAbsorptionHours(v) => cfg.max_absorption_hours = *v,
            Self::Note(v) => cfg.note = v.clone(),
        }
    }

    /// Wire name of the field this update targets, as it appears in the
    /// `CMD:SET_<FIELD>:` command and the `OK:<FIELD> set` reply.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::BatteryCapacityAh(_) => "BATTERY_CAPACITY",
            Self::ChargeThresholdPct(_) => "CHARGE_THRESHOLD",
            Self::LithiumMode(_) => "LITHIUM_MODE",
            Self::BulkVoltage(_) => "BULK_VOLTAGE",
            Self::AbsorptionVoltage(_) => "ABSORPTION_VOLTAGE",
            Self::FloatVoltage(_) => "FLOAT_VOLTAGE",
            Self::RechargeVoltage(_) => "RECHARGE_VOLTAGE",
            Self::MaxChargeCurrentMa(_) => "MAX_CURRENT",
            Self::FactorDivider(_) => "FACTOR_DIVIDER",
            Self::DcSourceActive(_) => "DC_SOURCE",
            Self::DcSourceRatedA(_) => "DC_SOURCE_AMPS",
            Self::LvdVoltage(_) => "LVD",
            Self::LvrVoltage(_) => "LVR",
            Self::MaxBulkHours(_) => "MAX_BULK_HOURS",
            Self::MaxAbsorptionHours(_) => "MAX_ABSORPTION_HOURS",
            Self::Note(_) => "NOTE",
        }
    }
}

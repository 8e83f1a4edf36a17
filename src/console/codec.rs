//! Console line framing and command parsing.
//!
//! The console protocol is newline-delimited ASCII:
//!
//! ```text
//! CMD:GET_DATA\n               → DATA:{...}
//! CMD:SET_FLOAT_VOLTAGE:13.8\n → OK:FLOAT_VOLTAGE set
//! CMD:TOGGLE_LOAD:120\n        → OK:load off for 120s
//! ```
//!
//! [`LineAccumulator`] reassembles lines from arbitrary byte chunks
//! (UART reads split lines anywhere), and [`parse_command`] turns a
//! complete line into a typed [`AppCommand`].  Parsing is pure and
//! panic-free on any input — malformed bytes degrade to an error reply,
//! never a reset.

use crate::app::commands::{AppCommand, ConfigUpdate};

/// Longest accepted command line, terminator excluded.
///
/// The longest legitimate command is `CMD:SET_NOTE:` plus a 64-byte
/// note; 128 leaves headroom without inviting unbounded buffering.
pub const MAX_LINE: usize = 128;

// ───────────────────────────────────────────────────────────────
// Line accumulator
// ───────────────────────────────────────────────────────────────

/// Reassembles newline-terminated lines from a byte stream.
///
/// Overlong lines are discarded in full: once the buffer overflows,
/// everything up to and including the next `\n` is dropped so a runaway
/// sender cannot smear garbage into the following command.
#[derive(Default)]
pub struct LineAccumulator {
    buf: heapless::Vec<u8, MAX_LINE>,
    overflow: bool,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a complete line when `byte` terminates one.
    ///
    /// A trailing `\r` is stripped (CRLF terminals).  Lines that
    /// overflowed or are not valid UTF-8 yield `None` and the
    /// accumulator resynchronises on the next newline.
    pub fn feed(&mut self, byte: u8) -> Option<heapless::String<MAX_LINE>> {
        if byte == b'\n' {
            if self.overflow {
                self.overflow = false;
                self.buf.clear();
                return None;
            }
            let mut end = self.buf.len();
            if end > 0 && self.buf[end - 1] == b'\r' {
                end -= 1;
            }
            let line = core::str::from_utf8(&self.buf[..end])
                .ok()
                .and_then(|s| heapless::String::try_from(s).ok());
            self.buf.clear();
            return line;
        }

        if self.overflow {
            return None;
        }
        if self.buf.push(byte).is_err() {
            self.overflow = true;
        }
        None
    }

    /// Bytes currently buffered awaiting a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

// ───────────────────────────────────────────────────────────────
// Command parsing
// ───────────────────────────────────────────────────────────────

/// Why a line did not parse into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No `CMD:` prefix or unrecognised command name.
    UnknownCommand,
    /// `SET_` targeting a field that does not exist.
    UnknownField,
    /// Argument missing or not parseable as the expected type.
    BadValue,
    /// Note exceeds the 64-byte persisted capacity.
    NoteTooLong,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::UnknownField => write!(f, "unknown field"),
            Self::BadValue => write!(f, "bad value"),
            Self::NoteTooLong => write!(f, "note too long (max 64)"),
        }
    }
}

/// Parse one complete console line into a typed command.
pub fn parse_command(line: &str) -> Result<AppCommand, ParseError> {
    let rest = line.strip_prefix("CMD:").ok_or(ParseError::UnknownCommand)?;

    match rest {
        "GET_DATA" => return Ok(AppCommand::GetData),
        "GET_CONFIG" => return Ok(AppCommand::GetConfig),
        "GET_CRASH_LOG" => return Ok(AppCommand::GetCrashLog),
        "CANCEL_TEMP_OFF" => return Ok(AppCommand::CancelTempOff),
        _ => {}
    }

    if let Some(arg) = rest.strip_prefix("TOGGLE_LOAD:") {
        let secs: u32 = arg.trim().parse().map_err(|_| ParseError::BadValue)?;
        return Ok(AppCommand::ToggleLoad(secs));
    }

    if let Some(assignment) = rest.strip_prefix("SET_") {
        return parse_set(assignment);
    }

    Err(ParseError::UnknownCommand)
}

/// Parse `<FIELD>:<value>` after a `SET_` prefix.
///
/// The value is everything after the **first** colon, so free-text
/// fields like NOTE may themselves contain colons.
fn parse_set(assignment: &str) -> Result<AppCommand, ParseError> {
    let (field, value) = assignment.split_once(':').ok_or(ParseError::BadValue)?;

    let update = match field {
        "BATTERY_CAPACITY" => ConfigUpdate::BatteryCapacityAh(parse_f32(value)?),
        "CHARGE_THRESHOLD" => ConfigUpdate::ChargeThresholdPct(parse_f32(value)?),
        "LITHIUM_MODE" => ConfigUpdate::LithiumMode(parse_bool(value)?),
        "BULK_VOLTAGE" => ConfigUpdate::BulkVoltage(parse_f32(value)?),
        "ABSORPTION_VOLTAGE" => ConfigUpdate::AbsorptionVoltage(parse_f32(value)?),
        "FLOAT_VOLTAGE" => ConfigUpdate::FloatVoltage(parse_f32(value)?),
        "RECHARGE_VOLTAGE" => ConfigUpdate::RechargeVoltage(parse_f32(value)?),
        "MAX_CURRENT" => ConfigUpdate::MaxChargeCurrentMa(parse_num(value)?),
        "FACTOR_DIVIDER" => ConfigUpdate::FactorDivider(parse_num(value)?),
        "DC_SOURCE" => ConfigUpdate::DcSourceActive(parse_bool(value)?),
        "DC_SOURCE_AMPS" => ConfigUpdate::DcSourceRatedA(parse_f32(value)?),
        "LVD" => ConfigUpdate::LvdVoltage(parse_f32(value)?),
        "LVR" => ConfigUpdate::LvrVoltage(parse_f32(value)?),
        "MAX_BULK_HOURS" => ConfigUpdate::MaxBulkHours(parse_f32(value)?),
        "MAX_ABSORPTION_HOURS" => ConfigUpdate::MaxAbsorptionHours(parse_f32(value)?),
        "NOTE" => ConfigUpdate::Note(
            heapless::String::try_from(value).map_err(|_| ParseError::NoteTooLong)?,
        ),
        _ => return Err(ParseError::UnknownField),
    };
    Ok(AppCommand::Set(update))
}

/// Strict float parse: `"NaN"` and `"inf"` parse successfully in Rust,
/// so the finite check keeps a console typo out of the validated config.
fn parse_f32(value: &str) -> Result<f32, ParseError> {
    let v: f32 = value.trim().parse().map_err(|_| ParseError::BadValue)?;
    if !v.is_finite() {
        return Err(ParseError::BadValue);
    }
    Ok(v)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ParseError::BadValue),
    }
}

fn parse_num<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.trim().parse().map_err(|_| ParseError::BadValue)
}

//! Mock hardware adapter for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO/PWM registers.  The sensor
//! snapshot is a plain public field: tests script a voltage or current
//! trajectory by mutating it between ticks.

use std::cell::RefCell;
use std::collections::HashMap;

use sunguard::app::events::AppEvent;
use sunguard::app::ports::{
    ActuatorPort, ConfigError, ConfigPort, EventSink, SensorPort, StorageError, StoragePort,
};
use sunguard::config::{validate_config, ChargerConfig};
use sunguard::fsm::context::{LedPattern, SensorSnapshot};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    SetChargeDuty(u16),
    SetLoad(bool),
    SetLed(LedPattern),
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    /// Readings returned by the next `read_all()`.
    pub snapshot: SensorSnapshot,
    pub calls: Vec<ActuatorCall>,
}

#[allow(dead_code)]
impl MockHardware {
    /// A healthy daytime system: panel lit, bank half charged, modest load.
    pub fn new() -> Self {
        Self {
            snapshot: SensorSnapshot {
                panel_voltage_v: 18.0,
                battery_voltage_v: 12.2,
                charge_current_ma: 2000.0,
                load_current_ma: 300.0,
                temperature_c: 25.0,
            },
            calls: Vec::new(),
        }
    }

    pub fn last_call(&self) -> Option<&ActuatorCall> {
        self.calls.last()
    }

    /// Most recently commanded charge duty.
    pub fn last_duty(&self) -> Option<u16> {
        self.calls.iter().rev().find_map(|c| match c {
            ActuatorCall::SetChargeDuty(d) => Some(*d),
            ActuatorCall::AllOff => Some(0),
            _ => None,
        })
    }

    /// Load switch state after the most recent command.
    pub fn load_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::SetLoad(on) => Some(*on),
                ActuatorCall::AllOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// LED pattern after the most recent command.
    pub fn led(&self) -> Option<LedPattern> {
        self.calls.iter().rev().find_map(|c| match c {
            ActuatorCall::SetLed(p) => Some(*p),
            ActuatorCall::AllOff => Some(LedPattern::Off),
            _ => None,
        })
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_all(&mut self) -> SensorSnapshot {
        self.snapshot
    }
}

impl ActuatorPort for MockHardware {
    fn set_charge_duty(&mut self, duty: u16) {
        self.calls.push(ActuatorCall::SetChargeDuty(duty));
    }

    fn set_load(&mut self, on: bool) {
        self.calls.push(ActuatorCall::SetLoad(on));
    }

    fn set_led(&mut self, pattern: LedPattern) {
        self.calls.push(ActuatorCall::SetLed(pattern));
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
    }
}

// ── MockNvs ───────────────────────────────────────────────────

/// In-memory NVS double.  Config blobs take the same postcard round
/// trip as the real adapter, so persistence tests exercise the actual
/// serialization path.
pub struct MockNvs {
    store: RefCell<HashMap<String, Vec<u8>>>,
}

impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: RefCell::new(HashMap::new()),
        }
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

fn composite_key(namespace: &str, key: &str) -> String {
    format!("{namespace}::{key}")
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.borrow().get(&composite_key(namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.borrow_mut().remove(&composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&composite_key(namespace, key))
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<ChargerConfig, ConfigError> {
        match self.store.borrow().get(&composite_key("charger", "config")) {
            Some(bytes) => postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted),
            None => Ok(ChargerConfig::default()),
        }
    }

    fn save(&self, config: &ChargerConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.store
            .borrow_mut()
            .insert(composite_key("charger", "config"), bytes);
        Ok(())
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Captures emitted events as debug strings for containment asserts.
pub struct LogSink {
    pub events: Vec<String>,
}

impl LogSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(format!("{:?}", event));
    }
}

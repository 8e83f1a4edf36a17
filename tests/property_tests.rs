//! Property and fuzz-style tests for robustness of the control core.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;
use sunguard::app::events::AppEvent;
use sunguard::app::ports::{ActuatorPort, EventSink, SensorPort};
use sunguard::app::service::AppService;
use sunguard::config::{validate_config, ChargerConfig};
use sunguard::console::codec::{parse_command, LineAccumulator};
use sunguard::control::regulator::DUTY_MAX;
use sunguard::fsm::context::{LedPattern, SensorSnapshot};
use sunguard::fsm::StateId;

// ── Console codec ─────────────────────────────────────────────

proptest! {
    /// Arbitrary byte garbage split into arbitrary chunks must never
    /// panic the accumulator or the parser.  Completed lines either
    /// parse or yield a typed error.
    #[test]
    fn codec_survives_arbitrary_bytes(
        chunks in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..=80),
            1..=8,
        ),
    ) {
        let mut acc = LineAccumulator::default();
        for chunk in &chunks {
            for &byte in chunk {
                if let Some(line) = acc.feed(byte) {
                    let _ = parse_command(&line);
                }
            }
        }
    }

    /// A well-formed SET line parses for any finite value.  Range
    /// enforcement belongs to config validation, not the parser.
    #[test]
    fn numeric_set_lines_always_parse(v in -1.0e6f32..=1.0e6f32) {
        let line = format!("CMD:SET_FLOAT_VOLTAGE:{v}");
        prop_assert!(parse_command(&line).is_ok());
    }

    /// Garbage after a valid line must not poison the next one: the
    /// accumulator resynchronises on every newline.
    #[test]
    fn garbage_lines_do_not_poison_following_commands(
        noise in proptest::collection::vec(any::<u8>(), 0..=200),
    ) {
        let mut acc = LineAccumulator::default();
        for &b in &noise {
            let _ = acc.feed(b);
        }
        let mut reply = None;
        for &b in b"\nCMD:GET_DATA\n" {
            if let Some(line) = acc.feed(b) {
                reply = parse_command(&line).ok();
            }
        }
        prop_assert!(reply.is_some(), "GET_DATA must parse after resync");
    }
}

// ── Config validation invariants ──────────────────────────────

proptest! {
    /// The LVD/LVR hysteresis band must never validate inverted or
    /// collapsed to zero width.
    #[test]
    fn inverted_lvd_lvr_never_validates(
        lvd in 10.0f32..=13.0f32,
        gap in 0.0f32..=1.0f32,
    ) {
        let cfg = ChargerConfig {
            lvd_voltage_v: lvd,
            lvr_voltage_v: lvd - gap,
            ..ChargerConfig::default()
        };
        prop_assert!(validate_config(&cfg).is_err());
    }

    /// A float setpoint above absorption can never validate.
    #[test]
    fn float_above_absorption_never_validates(
        absorption in 12.0f32..=15.0f32,
        excess in 0.01f32..=1.0f32,
    ) {
        let cfg = ChargerConfig {
            absorption_voltage_v: absorption,
            float_voltage_v: absorption + excess,
            ..ChargerConfig::default()
        };
        prop_assert!(validate_config(&cfg).is_err());
    }

    /// Recharge at or above float would re-trigger BULK the moment the
    /// charger settles; validation must refuse it.
    #[test]
    fn recharge_at_or_above_float_never_validates(
        float_v in 12.0f32..=14.0f32,
        excess in 0.0f32..=0.5f32,
    ) {
        let cfg = ChargerConfig {
            float_voltage_v: float_v,
            recharge_voltage_v: float_v + excess,
            ..ChargerConfig::default()
        };
        prop_assert!(validate_config(&cfg).is_err());
    }
}

// ── Whole-service robustness ──────────────────────────────────

#[derive(Default)]
struct PropHw {
    snapshot: SensorSnapshot,
    last_duty: u16,
    max_duty: u16,
}

impl SensorPort for PropHw {
    fn read_all(&mut self) -> SensorSnapshot {
        self.snapshot
    }
}

impl ActuatorPort for PropHw {
    fn set_charge_duty(&mut self, duty: u16) {
        self.last_duty = duty;
        self.max_duty = self.max_duty.max(duty);
    }
    fn set_load(&mut self, _on: bool) {}
    fn set_led(&mut self, _pattern: LedPattern) {}
    fn all_off(&mut self) {
        self.last_duty = 0;
    }
}

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

fn arb_voltage() -> impl Strategy<Value = f32> {
    prop_oneof![
        8 => -5.0f32..=70.0f32,
        1 => Just(f32::NAN),
        1 => Just(f32::INFINITY),
    ]
}

fn arb_current() -> impl Strategy<Value = f32> {
    prop_oneof![
        8 => -5000.0f32..=40_000.0f32,
        1 => Just(f32::NAN),
        1 => Just(f32::NEG_INFINITY),
    ]
}

fn arb_temp() -> impl Strategy<Value = f32> {
    prop_oneof![
        8 => -60.0f32..=160.0f32,
        1 => Just(f32::NAN),
    ]
}

proptest! {
    /// Hostile sensor streams (rail noise, NaN, infinities) must never
    /// panic the service, never push duty past the hardware ceiling, and
    /// never leave the ERROR stage driving the charger.  Telemetry built
    /// from such streams must still be presentable.
    #[test]
    fn service_tick_is_total_and_bounded(
        frames in proptest::collection::vec(
            (arb_voltage(), arb_voltage(), arb_current(), arb_current(), arb_temp()),
            1..=50,
        ),
    ) {
        let mut app = AppService::new(ChargerConfig::default());
        let mut hw = PropHw::default();
        let mut sink = NullSink;
        app.start(&mut sink);

        let mut now_ms = 0u32;
        for (panel, battery, charge, load, temp) in frames {
            hw.snapshot = SensorSnapshot {
                panel_voltage_v: panel,
                battery_voltage_v: battery,
                charge_current_ma: charge,
                load_current_ma: load,
                temperature_c: temp,
            };
            now_ms = now_ms.wrapping_add(1000);
            app.tick(&mut hw, &mut sink, now_ms);

            prop_assert!(hw.max_duty <= DUTY_MAX);
            if app.state() == StateId::Error {
                prop_assert_eq!(hw.last_duty, 0, "faulted stage must not drive the charger");
            }

            let t = app.build_telemetry(now_ms);
            prop_assert!(t.battery_voltage_v.is_finite());
            prop_assert!(t.charge_current_ma >= 0.0);
            prop_assert!((0.0..=100.0).contains(&t.soc_pct));
            prop_assert!(t.accumulated_ah >= 0.0);
        }
    }
}

// ── Crash-log ring buffer ─────────────────────────────────────

// The ring lives in NVS, so a plain in-memory store stands in for it.
#[test]
fn crash_ring_is_bounded_and_index_survives_reinit() {
    use std::collections::HashMap;
    use sunguard::app::ports::{StorageError, StoragePort};
    use sunguard::diagnostics::{CrashEntry, CrashLog};

    struct MemStore(HashMap<String, Vec<u8>>);
    impl StoragePort for MemStore {
        fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
            match self.0.get(&format!("{ns}::{key}")) {
                Some(v) => {
                    let n = v.len().min(buf.len());
                    buf[..n].copy_from_slice(&v[..n]);
                    Ok(n)
                }
                None => Err(StorageError::NotFound),
            }
        }
        fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
            self.0.insert(format!("{ns}::{key}"), data.to_vec());
            Ok(())
        }
        fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
            self.0.remove(&format!("{ns}::{key}"));
            Ok(())
        }
        fn exists(&self, ns: &str, key: &str) -> bool {
            self.0.contains_key(&format!("{ns}::{key}"))
        }
    }

    let mut nvs = MemStore(HashMap::new());
    let mut log = CrashLog::new();
    log.init(&nvs);

    for i in 0..7u64 {
        log.write_entry(&mut nvs, &CrashEntry::new(i, "watchdog reset", 0x4008_1c2e));
    }
    assert!(log.read_all(&nvs).len() <= 4, "ring must hold at most 4 entries");
    assert!(log.count(&nvs) <= 4);

    // A reboot re-reads the persisted index; the next write lands on the
    // oldest slot, not slot 0.
    let mut reborn = CrashLog::new();
    reborn.init(&nvs);
    reborn.write_entry(&mut nvs, &CrashEntry::new(99, "brownout", 0));
    let entries = reborn.read_all(&nvs);
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().any(|e| e.uptime_secs == 99));
    assert!(
        entries.iter().filter(|e| e.reason.as_str() == "watchdog reset").count() == 3,
        "one old slot must have been overwritten"
    );
}

proptest! {
    /// Crash reasons come from panic payloads, so any UTF-8 must be
    /// accepted and truncated without panicking, and the entry must
    /// survive a postcard round-trip.
    #[test]
    fn crash_entry_accepts_arbitrary_reasons(reason in ".{0,200}") {
        use sunguard::diagnostics::CrashEntry;

        let entry = CrashEntry::new(42, &reason, 0x4000_0000);
        prop_assert!(entry.reason.len() <= 63);
        prop_assert!(reason.starts_with(entry.reason.as_str()));

        let bytes = postcard::to_allocvec(&entry);
        prop_assert!(bytes.is_ok());
    }
}

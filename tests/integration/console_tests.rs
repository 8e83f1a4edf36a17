//! Console protocol against the full application stack.
//!
//! Unlike the engine's own unit tests, these thread a command all the
//! way through: serial bytes → parse → AppService mutation → NVS
//! persistence → a later "reboot" observing the stored state.

use crate::mock_hw::{LogSink, MockHardware, MockNvs};

use sunguard::app::ports::ConfigPort;
use sunguard::app::service::AppService;
use sunguard::config::ChargerConfig;
use sunguard::console::engine::ConsoleEngine;
use sunguard::diagnostics::{CrashEntry, CrashLog};
use sunguard::fsm::StateId;

struct Rig {
    console: ConsoleEngine,
    app: AppService,
    hw: MockHardware,
    sink: LogSink,
    nvs: MockNvs,
}

fn rig() -> Rig {
    let mut app = AppService::new(ChargerConfig::default());
    let mut sink = LogSink::new();
    app.start(&mut sink);
    Rig {
        console: ConsoleEngine::new(),
        app,
        hw: MockHardware::new(),
        sink,
        nvs: MockNvs::new(),
    }
}

impl Rig {
    fn send(&mut self, line: &str, now_ms: u32) -> String {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.console
            .feed_bytes(
                &bytes,
                &mut self.app,
                &mut self.hw,
                &mut self.sink,
                &self.nvs,
                now_ms,
            )
            .expect("command should produce a reply")
    }

    fn run_ticks(&mut self, n: u32, now_ms: &mut u32) {
        for _ in 0..n {
            *now_ms += 1000;
            self.app.tick(&mut self.hw, &mut self.sink, *now_ms);
        }
    }
}

#[test]
fn get_data_reflects_scripted_readings() {
    let mut r = rig();
    let mut now = 0;
    r.hw.snapshot.battery_voltage_v = 12.8;
    r.run_ticks(3, &mut now);

    let reply = r.send("CMD:GET_DATA", now);
    assert!(reply.starts_with("DATA:{"), "got: {reply}");
    assert!(reply.contains("\"stage\":\"BULK\""));
    assert!(reply.contains("\"battery_voltage_v\":12.8"));
    assert!(reply.contains("\"load_on\":true"));
}

#[test]
fn set_survives_auto_save_and_reboot() {
    let mut r = rig();
    let mut now = 0;

    let reply = r.send("CMD:SET_FLOAT_VOLTAGE:13.8", now);
    assert_eq!(reply, "OK:FLOAT_VOLTAGE set\n");
    assert!(r.app.is_config_dirty());

    // The auto-save debounce needs a few seconds of ticks to elapse.
    r.run_ticks(8, &mut now);
    assert!(r.app.auto_save_if_needed(&r.nvs), "auto-save must fire");

    // "Reboot": a fresh service built from what NVS now holds.
    let restored = r.nvs.load().unwrap();
    assert!((restored.float_voltage_v - 13.8).abs() < 1e-6);

    let mut app2 = AppService::new(restored);
    let mut sink2 = LogSink::new();
    app2.start(&mut sink2);
    let reply = ConsoleEngine::new()
        .feed_bytes(
            b"CMD:GET_CONFIG\n",
            &mut app2,
            &mut r.hw,
            &mut sink2,
            &r.nvs,
            0,
        )
        .unwrap();
    assert!(reply.contains("\"float_voltage_v\":13.8"), "got: {reply}");
}

#[test]
fn rejected_set_is_never_persisted() {
    let mut r = rig();
    let mut now = 0;

    let reply = r.send("CMD:SET_LVR:11.5", now); // below the 12.0 LVD
    assert!(reply.starts_with("ERROR:validation failed"), "got: {reply}");
    assert!(!r.app.is_config_dirty());

    r.run_ticks(8, &mut now);
    assert!(!r.app.auto_save_if_needed(&r.nvs), "nothing dirty, nothing saved");
    let stored = r.nvs.load().unwrap();
    assert!((stored.lvr_voltage_v - 12.5).abs() < 1e-6, "defaults must remain");
}

#[test]
fn toggle_load_expires_with_the_tick_clock() {
    let mut r = rig();
    let mut now = 5000;
    r.run_ticks(1, &mut now);
    assert!(r.hw.load_on());

    let reply = r.send("CMD:TOGGLE_LOAD:2", now);
    assert_eq!(reply, "OK:load off for 2s\n");
    assert!(!r.hw.load_on(), "disconnect happens on the command, not the next tick");

    r.run_ticks(1, &mut now);
    assert!(!r.hw.load_on(), "1 s in, the window is still open");

    let telemetry = r.send("CMD:GET_DATA", now);
    assert!(telemetry.contains("\"temp_off_remaining_secs\":1"), "got: {telemetry}");

    r.run_ticks(2, &mut now);
    assert!(r.hw.load_on(), "expiry must re-engage the load");
}

#[test]
fn cancel_temp_off_restores_load_unless_lvd_holds() {
    let mut r = rig();
    let mut now = 0;

    // Healthy bank: toggle then cancel snaps the load straight back.
    r.run_ticks(1, &mut now);
    assert_eq!(r.send("CMD:TOGGLE_LOAD:120", now), "OK:load off for 120s\n");
    assert_eq!(r.send("CMD:CANCEL_TEMP_OFF", now), "OK:temp off cancelled\n");
    assert!(r.hw.load_on());

    // Sagging bank: the LVD latch owns the switch, the console cannot
    // re-energise it.
    r.hw.snapshot.battery_voltage_v = 11.8;
    r.run_ticks(1, &mut now);
    assert!(!r.hw.load_on());
    assert_eq!(r.send("CMD:TOGGLE_LOAD:60", now), "OK:load already off\n");
    assert_eq!(r.send("CMD:CANCEL_TEMP_OFF", now), "OK:no temp off active\n");
    assert!(!r.hw.load_on(), "LVD latch must survive console traffic");
}

#[test]
fn crash_ring_survives_reboot_and_caps_at_four() {
    let mut r = rig();

    // A previous boot recorded six crashes; only the last four slots
    // survive in the ring.
    {
        let mut log = CrashLog::new();
        for i in 0..6u64 {
            log.write_entry(&mut r.nvs, &CrashEntry::new(i * 100, "brownout", 0x4008_0000));
        }
    }

    r.console.init_crash_log(&r.nvs);
    let reply = r.send("CMD:GET_CRASH_LOG", 0);
    assert!(reply.starts_with("CRASH:{"), "got: {reply}");
    assert_eq!(
        reply.matches("\"reason\"").count(),
        4,
        "ring must cap at four entries: {reply}"
    );
    assert!(reply.contains("\"metrics\""));
    assert!(reply.contains("\"brownout\""));
}

#[test]
fn state_reported_over_console_tracks_faults() {
    let mut r = rig();
    let mut now = 0;

    r.hw.snapshot.temperature_c = 95.0;
    r.run_ticks(1, &mut now);
    assert_eq!(r.app.state(), StateId::Error);

    let reply = r.send("CMD:GET_DATA", now);
    assert!(reply.contains("\"stage\":\"ERROR\""), "got: {reply}");
    assert!(reply.contains("\"duty\":0"));
    // OverTemperature is bit 1 of the fault mask.
    assert!(reply.contains("\"fault_flags\":2"), "got: {reply}");
}

//! Load-disconnect behaviour through the full service tick.
//!
//! The guard's own unit tests cover the latch math; these verify the
//! service-level contract: the switch actually gets driven, events are
//! emitted, and charging faults never interfere with the load.

use crate::mock_hw::{ActuatorCall, LogSink, MockHardware};

use sunguard::app::service::AppService;
use sunguard::config::ChargerConfig;
use sunguard::fsm::StateId;
use sunguard::loadguard::TempOffOutcome;

fn make_app() -> (AppService, MockHardware, LogSink) {
    let mut app = AppService::new(ChargerConfig::default());
    let hw = MockHardware::new();
    let mut sink = LogSink::new();
    app.start(&mut sink);
    (app, hw, sink)
}

fn run_ticks(
    app: &mut AppService,
    hw: &mut MockHardware,
    sink: &mut LogSink,
    n: u32,
    now_ms: &mut u32,
) {
    for _ in 0..n {
        *now_ms += 1000;
        app.tick(hw, sink, *now_ms);
    }
}

#[test]
fn lvd_event_and_switch_then_lvr_recovery() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;

    run_ticks(&mut app, &mut hw, &mut sink, 2, &mut now);
    assert!(hw.load_on());

    hw.snapshot.battery_voltage_v = 11.9;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    assert!(!hw.load_on());
    let t = app.build_telemetry(now);
    assert!(t.lvd_latched);
    assert!(!t.load_on);
    assert!(
        sink.events.iter().any(|e| e.contains("LoadSwitched { on: false }")),
        "disconnect must be announced: {:?}",
        sink.events
    );

    // Charging lifts the bank through the deadband; nothing moves
    // until LVR.
    hw.snapshot.battery_voltage_v = 12.45;
    run_ticks(&mut app, &mut hw, &mut sink, 3, &mut now);
    assert!(!hw.load_on(), "deadband must hold the latch");

    hw.snapshot.battery_voltage_v = 12.55;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    assert!(hw.load_on());
    assert!(
        sink.events.iter().any(|e| e.contains("LoadSwitched { on: true }")),
        "reconnect must be announced"
    );
}

#[test]
fn charging_fault_and_load_guard_stay_independent() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;

    // Over-temperature kills charging but not the load.
    hw.snapshot.temperature_c = 95.0;
    run_ticks(&mut app, &mut hw, &mut sink, 2, &mut now);
    assert_eq!(app.state(), StateId::Error);
    assert_eq!(hw.last_duty(), Some(0));
    assert!(hw.load_on(), "load must survive a charging fault");

    // Battery collapse while still faulted: now the guard opens the
    // load, independently of the ERROR stage.
    hw.snapshot.battery_voltage_v = 11.5;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    assert_eq!(app.state(), StateId::Error);
    assert!(!hw.load_on());
}

#[test]
fn temp_off_expiry_defers_to_lvd_latch() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);

    let outcome = app.request_temp_off(3, now, &mut hw, &mut sink);
    assert_eq!(outcome, TempOffOutcome::Started);
    assert!(!hw.load_on());

    // The bank collapses inside the off-window.
    hw.snapshot.battery_voltage_v = 11.7;
    run_ticks(&mut app, &mut hw, &mut sink, 2, &mut now);
    assert!(!hw.load_on());

    // Timer has expired, but LVD holds the switch open.
    run_ticks(&mut app, &mut hw, &mut sink, 3, &mut now);
    assert!(!hw.load_on(), "expiry must not override the LVD latch");
    assert!(app.build_telemetry(now).lvd_latched);

    hw.snapshot.battery_voltage_v = 12.6;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    assert!(hw.load_on(), "only LVR releases the load");
}

#[test]
fn temp_off_countdown_shows_in_telemetry() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 10_000;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);

    app.request_temp_off(60, now, &mut hw, &mut sink);
    assert_eq!(app.build_telemetry(now).temp_off_remaining_secs, 60);

    run_ticks(&mut app, &mut hw, &mut sink, 45, &mut now);
    assert_eq!(app.build_telemetry(now).temp_off_remaining_secs, 15);
    assert!(!hw.load_on());

    run_ticks(&mut app, &mut hw, &mut sink, 15, &mut now);
    assert_eq!(app.build_telemetry(now).temp_off_remaining_secs, 0);
    assert!(hw.load_on());
}

#[test]
fn out_of_range_temp_off_leaves_switch_untouched() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    hw.calls.clear();

    assert_eq!(
        app.request_temp_off(0, now, &mut hw, &mut sink),
        TempOffOutcome::InvalidDuration
    );
    assert_eq!(
        app.request_temp_off(301, now, &mut hw, &mut sink),
        TempOffOutcome::InvalidDuration
    );
    assert_eq!(
        app.request_temp_off(100_000, now, &mut hw, &mut sink),
        TempOffOutcome::InvalidDuration,
        "durations past u16 must be rejected, not truncated"
    );
    assert!(
        !hw.calls.iter().any(|c| matches!(c, ActuatorCall::SetLoad(_))),
        "rejected requests must not touch the switch: {:?}",
        hw.calls
    );
}

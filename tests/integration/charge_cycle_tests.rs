//! Full charge-cycle progression through the application service.
//!
//! Drives BULK → ABSORPTION → FLOAT → BULK by scripting realistic
//! voltage/current trajectories into the mock sensor snapshot, and
//! checks the service-level side effects (events, Ah bookkeeping, LED)
//! the in-module FSM tests do not see.

use crate::mock_hw::{LogSink, MockHardware};

use sunguard::app::service::AppService;
use sunguard::config::ChargerConfig;
use sunguard::fsm::context::LedPattern;
use sunguard::fsm::states::STAGE_DEBOUNCE_TICKS;
use sunguard::fsm::StateId;

fn make_app() -> (AppService, MockHardware, LogSink) {
    let mut app = AppService::new(ChargerConfig::default());
    let hw = MockHardware::new();
    let mut sink = LogSink::new();
    app.start(&mut sink);
    (app, hw, sink)
}

/// Run `n` ticks, advancing the injected millisecond clock 1 s per tick.
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
fn bulk_handoff_requires_sustained_target_voltage() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;

    run_ticks(&mut app, &mut hw, &mut sink, 3, &mut now);
    assert_eq!(app.state(), StateId::Bulk, "12.2 V bank stays in BULK");

    // Battery regulated up to the bulk target, but with one dip in the
    // middle of the debounce window.
    hw.snapshot.battery_voltage_v = 14.35;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS - 1, &mut now);
    assert_eq!(app.state(), StateId::Bulk, "one tick short of the debounce");

    hw.snapshot.battery_voltage_v = 13.9;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);

    hw.snapshot.battery_voltage_v = 14.35;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS - 1, &mut now);
    assert_eq!(app.state(), StateId::Bulk, "the dip must restart the debounce");

    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    assert_eq!(app.state(), StateId::Absorption);
}

#[test]
fn full_cycle_progression_with_ah_reset() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;
    hw.snapshot.load_current_ma = 100.0;

    // BULK → ABSORPTION: bank holds the bulk target.
    hw.snapshot.battery_voltage_v = 14.35;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS, &mut now);
    assert_eq!(app.state(), StateId::Absorption);
    assert_eq!(hw.led(), Some(LedPattern::FastBlink));

    // ABSORPTION → FLOAT: acceptance current tapers under the
    // 1000 mA threshold of the default 100 Ah / 1% config.
    hw.snapshot.charge_current_ma = 400.0;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS, &mut now);
    assert_eq!(app.state(), StateId::Float);
    assert_eq!(hw.led(), Some(LedPattern::Solid));

    let ah_at_float = app.build_telemetry(now).accumulated_ah;
    assert!(ah_at_float > 0.0, "charge bookkeeping must have accumulated");

    // FLOAT → BULK: overnight discharge sags under the recharge line.
    hw.snapshot.battery_voltage_v = 12.4;
    hw.snapshot.charge_current_ma = 0.0;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS, &mut now);
    assert_eq!(app.state(), StateId::Bulk);
    assert_eq!(hw.led(), Some(LedPattern::SlowBlink));
    assert!(
        app.build_telemetry(now).accumulated_ah < ah_at_float,
        "a fresh BULK entry restarts the Ah counter"
    );

    let changes: Vec<&String> = sink
        .events
        .iter()
        .filter(|e| e.contains("StageChanged"))
        .collect();
    assert_eq!(changes.len(), 3, "exactly three transitions: {changes:?}");
    assert!(changes[0].contains("ABSORPTION"));
    assert!(changes[1].contains("FLOAT"));
    assert!(changes[2].contains("BULK"));
}

#[test]
fn absorption_taper_interrupted_by_current_blip() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;
    hw.snapshot.load_current_ma = 100.0;

    hw.snapshot.battery_voltage_v = 14.35;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS, &mut now);
    assert_eq!(app.state(), StateId::Absorption);

    // Taper almost through, then a cloud-edge current blip.
    hw.snapshot.charge_current_ma = 400.0;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS - 1, &mut now);
    hw.snapshot.charge_current_ma = 1500.0;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    hw.snapshot.charge_current_ma = 400.0;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS - 1, &mut now);
    assert_eq!(app.state(), StateId::Absorption, "blip must restart the taper count");

    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    assert_eq!(app.state(), StateId::Float);
}

#[test]
fn float_load_spike_restarts_bulk_without_debounce() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;
    hw.snapshot.load_current_ma = 100.0;

    hw.snapshot.battery_voltage_v = 14.35;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS, &mut now);
    hw.snapshot.charge_current_ma = 400.0;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS, &mut now);
    assert_eq!(app.state(), StateId::Float);

    // An inverter kicks in: load jumps past the 200 mA float limit.
    hw.snapshot.load_current_ma = 350.0;
    run_ticks(&mut app, &mut hw, &mut sink, 1, &mut now);
    assert_eq!(app.state(), StateId::Bulk, "spike path has no debounce");
}

#[test]
fn absorption_budget_caps_the_stage_when_taper_never_comes() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;
    hw.snapshot.load_current_ma = 100.0;

    hw.snapshot.battery_voltage_v = 14.35;
    run_ticks(&mut app, &mut hw, &mut sink, STAGE_DEBOUNCE_TICKS, &mut now);
    assert_eq!(app.state(), StateId::Absorption);

    // 100 Ah at 1% acceptance computes a 5 h budget, clamped to the
    // 2 h cap.  Current never tapers (tired bank), so only the budget
    // can end the stage: 2 h at the 1 s tick is 7200 ticks.
    let budget = app.build_telemetry(now).absorption_budget_hours;
    assert!((budget - 2.0).abs() < 1e-3, "expected the clamped 2 h budget, got {budget}");

    run_ticks(&mut app, &mut hw, &mut sink, 7199, &mut now);
    assert_eq!(app.state(), StateId::Absorption, "one tick short of the budget");

    run_ticks(&mut app, &mut hw, &mut sink, 2, &mut now);
    assert_eq!(app.state(), StateId::Float, "budget expiry must force the handoff");
}

#[test]
fn error_stage_holds_duty_at_zero_until_recovery_ramps_fresh() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut now = 0;

    run_ticks(&mut app, &mut hw, &mut sink, 10, &mut now);
    let duty_before = hw.last_duty().unwrap();
    assert!(duty_before > 0);

    hw.snapshot.temperature_c = 95.0;
    run_ticks(&mut app, &mut hw, &mut sink, 3, &mut now);
    assert_eq!(app.state(), StateId::Error);
    assert_eq!(hw.last_duty(), Some(0));
    assert_eq!(hw.led(), Some(LedPattern::Off));

    // Recovery: after the clear debounce the regulator restarts from
    // zero instead of re-applying the stale pre-fault duty.
    hw.snapshot.temperature_c = 25.0;
    run_ticks(&mut app, &mut hw, &mut sink, 31, &mut now);
    assert_eq!(app.state(), StateId::Bulk);
    let duty_after = hw.last_duty().unwrap();
    assert!(
        duty_after > 0 && duty_after < duty_before,
        "recovered duty must ramp from the bottom: {duty_after} vs {duty_before}"
    );
}

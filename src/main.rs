//! SunGuard Firmware — Main Entry Point
//!
//! Hexagonal architecture with event-driven execution.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Sensor+Actuator) (EventSink)    (Config+NVS) (uptime)        │
//! │  ConsoleEngine                                                 │
//! │  (UART line protocol)                                          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Safety · Regulator · LoadGuard · SOC            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
mod error;
mod events;
mod loadguard;
mod pins;
mod safety;

pub mod app;
mod adapters;
pub mod console;
mod control;
pub mod diagnostics;
mod drivers;
pub mod fsm;
mod sensors;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use adapters::hardware::HardwareAdapter;
use adapters::log_sink::LogEventSink;
use adapters::nvs::NvsAdapter;
use adapters::time::Esp32TimeAdapter;
use app::events::AppEvent;
use app::ports::ConfigPort;
use app::service::AppService;
use config::ChargerConfig;
use console::ConsoleEngine;
use drivers::charge_pwm::ChargePwm;
use drivers::load_switch::LoadSwitch;
use drivers::status_led::StatusLed;
use events::{push_event, Event};

/// Telemetry log cadence in control ticks (one line per 5 s at 1 Hz).
const TELEMETRY_PERIOD_TICKS: u64 = 5;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SunGuard v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();

    // ── 1b. Initialise hardware peripherals ───────────────────
    if let Err(e) = drivers::hw_init::init_peripherals() {
        // Peripheral init failure is critical — log and halt.
        // In production this triggers the watchdog reset after timeout.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    drivers::hw_timer::start_timers();
    let watchdog = drivers::watchdog::Watchdog::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            // Continue without NVS — config will not be persisted this session.
            // On next reboot, NVS should self-heal.
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ChargerConfig::default()
        }
    };

    // ── 3. Construct adapters ─────────────────────────────────
    let sensor_hub = sensors::SensorHub::new(
        sensors::power::PowerMonitor::new(),
        sensors::temperature::TemperatureSensor::new(pins::TEMP_ADC_GPIO),
    );

    let mut hw = HardwareAdapter::new(
        sensor_hub,
        ChargePwm::new(),
        LoadSwitch::new(),
        StatusLed::new(),
    );

    let mut log_sink = LogEventSink::new();
    let time_adapter = Esp32TimeAdapter::new();

    // ── 4. Construct app service ──────────────────────────────
    let mut app = AppService::new(config);
    app.start(&mut log_sink);

    // ── 5. Serial console ─────────────────────────────────────
    let mut console = ConsoleEngine::new();
    console.init_crash_log(&nvs);

    info!("System ready. Entering control loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    let mut uart_buf = [0u8; 128];
    let mut last_telemetry_tick: u64 = 0;

    loop {
        // Simulate timer interrupts via sleep on non-espidf targets.
        // On real hardware, the CPU executes WFI (Wait For Interrupt)
        // and wakes when the control timer or UART fires.
        #[cfg(not(target_os = "espidf"))]
        {
            std::thread::sleep(std::time::Duration::from_millis(
                config::TICK_PERIOD_MS as u64,
            ));
            push_event(Event::ControlTick);
        }

        let now_ms = time_adapter.uptime_ms();

        // Telemetry cadence rides the tick count, not loop passes —
        // the loop spins faster than 1 Hz while polling the console.
        let ticks = app.tick_count();
        if ticks != last_telemetry_tick && ticks % TELEMETRY_PERIOD_TICKS == 0 {
            last_telemetry_tick = ticks;
            push_event(Event::TelemetryTick);
        }

        // Process all pending events.
        events::drain_events(|event| match event {
            Event::ControlTick => {
                app.tick(&mut hw, &mut log_sink, now_ms);
            }

            Event::TelemetryTick => {
                let t = app.build_telemetry(now_ms);
                log_sink.emit(&AppEvent::Telemetry(t));
            }
        });

        // Serial console — drain whatever arrived since the last pass.
        // Commands run between ticks; a config replacement accepted here
        // is in effect by the next ControlTick.
        let n = drivers::hw_init::uart_read(&mut uart_buf);
        if n > 0 {
            if let Some(reply) = console.feed_bytes(
                &uart_buf[..n],
                &mut app,
                &mut hw,
                &mut log_sink,
                &nvs,
                now_ms,
            ) {
                drivers::hw_init::uart_write(reply.as_bytes());
            }
        }

        // Config auto-save (5 s debounce after last change).
        app.auto_save_if_needed(&nvs);

        // Feed watchdog on every iteration.
        watchdog.feed();
    }
}

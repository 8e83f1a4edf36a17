//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Creates the periodic control tick timer that pushes events into the
//! lock-free SPSC queue. On simulation targets, the sleep loop in
//! `main()` pushes the same event instead.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely call push_event() which uses AtomicU8.

use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
static mut CONTROL_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// SAFETY: CONTROL_TIMER is written once in `start_timers()` before any
/// timer callbacks fire.  Only called from the single main task.
#[cfg(target_os = "espidf")]
unsafe fn control_timer() -> esp_timer_handle_t { unsafe { CONTROL_TIMER } }

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::ControlTick);
}

/// Start the hardware control tick timer (1 Hz).
#[cfg(target_os = "espidf")]
pub fn start_timers() {
    // SAFETY: CONTROL_TIMER is written here once at boot from the single
    // main-task context before any timer callbacks fire.  The callback
    // itself only calls push_event(), which is ISR-safe.
    unsafe {
        let control_args = esp_timer_create_args_t {
            callback: Some(control_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"control\0".as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&control_args, &raw mut CONTROL_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: control timer create failed (rc={}) — continuing without control ticks", ret);
            return;
        }
        let period_us = u64::from(crate::config::TICK_PERIOD_MS) * 1_000;
        let ret = esp_timer_start_periodic(CONTROL_TIMER, period_us);
        if ret != ESP_OK {
            log::error!("hw_timer: control timer start failed (rc={})", ret);
            return;
        }

        info!("hw_timer: control@1Hz started");
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers() {
    log::info!("hw_timer(sim): timers not started (events driven by sleep loop)");
}

/// Stop the control tick timer.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: CONTROL_TIMER is a valid handle if start_timers() succeeded;
    // null-check prevents double-free.
    unsafe {
        // SAFETY: control_timer() contract — main task only.
        let ct = control_timer();
        if !ct.is_null() { esp_timer_stop(ct); }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}

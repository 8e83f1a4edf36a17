//! Console command engine.
//!
//! Owns the line accumulator, the per-link rate limiter, and the crash
//! log handle.  Bytes go in, one reply line per complete command comes
//! out.  Dispatch runs synchronously against the [`AppService`] so
//! every reply reflects the state the command actually produced.
//!
//! Flood protection: a token bucket caps command processing at 10/s.
//! Excess commands still get a reply (`ERROR:rate limit exceeded`) so
//! an operator script notices the shedding instead of hanging.

use std::time::Duration;

use burster::Limiter;
use log::{info, warn};
use serde::Serialize;

use crate::app::commands::AppCommand;
use crate::app::ports::{ActuatorPort, EventSink, StoragePort};
use crate::app::service::AppService;
use crate::diagnostics::{CrashEntry, CrashLog, RuntimeMetrics};
use crate::loadguard::TempOffOutcome;

use super::codec::{self, LineAccumulator};

/// Commands processed per second before the limiter sheds load.
const CMD_RATE_PER_SEC: u64 = 10;

/// Monotonic clock for the rate limiter.
#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    Duration::from_micros(unsafe { esp_idf_svc::sys::esp_timer_get_time() } as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

/// Payload behind the `CRASH:` reply prefix.
#[derive(Serialize)]
struct CrashReport {
    entries: heapless::Vec<CrashEntry, 4>,
    metrics: RuntimeMetrics,
}

// ───────────────────────────────────────────────────────────────
// ConsoleEngine
// ───────────────────────────────────────────────────────────────

pub struct ConsoleEngine {
    acc: LineAccumulator,
    limiter: burster::TokenBucket<fn() -> Duration>,
    crash_log: CrashLog,
}

impl ConsoleEngine {
    pub fn new() -> Self {
        Self {
            acc: LineAccumulator::new(),
            limiter: burster::TokenBucket::new_with_time_provider(
                CMD_RATE_PER_SEC,
                CMD_RATE_PER_SEC,
                platform_now as fn() -> Duration,
            ),
            crash_log: CrashLog::new(),
        }
    }

    /// Load the crash ring index so dumps include entries from past boots.
    pub fn init_crash_log(&mut self, nvs: &dyn StoragePort) {
        self.crash_log.init(nvs);
    }

    /// Feed raw console bytes.
    ///
    /// Returns newline-terminated reply text when at least one complete
    /// command was processed; `None` while a line is still accumulating.
    /// Blank lines are ignored, everything else gets exactly one reply.
    pub fn feed_bytes(
        &mut self,
        data: &[u8],
        app: &mut AppService,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
        storage: &dyn StoragePort,
        now_ms: u32,
    ) -> Option<String> {
        let mut out = String::new();
        for &byte in data {
            let Some(line) = self.acc.feed(byte) else {
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            out.push_str(&self.dispatch(line, app, hw, sink, storage, now_ms));
            out.push('\n');
        }
        if out.is_empty() { None } else { Some(out) }
    }

    fn dispatch(
        &mut self,
        line: &str,
        app: &mut AppService,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
        storage: &dyn StoragePort,
        now_ms: u32,
    ) -> String {
        if self.limiter.try_consume(1).is_err() {
            warn!("Console: rate limit hit, shedding command");
            return "ERROR:rate limit exceeded".to_string();
        }

        let cmd = match codec::parse_command(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("Console: rejected line ({e})");
                return format!("ERROR:{e}");
            }
        };
        info!("Console: {:?}", cmd);

        match cmd {
            AppCommand::GetData => match serde_json::to_string(&app.build_telemetry(now_ms)) {
                Ok(json) => format!("DATA:{json}"),
                Err(_) => "ERROR:telemetry encoding failed".to_string(),
            },

            AppCommand::GetConfig => match serde_json::to_string(&app.current_config()) {
                Ok(json) => format!("CONFIG:{json}"),
                Err(_) => "ERROR:config encoding failed".to_string(),
            },

            AppCommand::Set(update) => {
                let field = update.field_name();
                match app.apply_config_update(&update, sink) {
                    Ok(()) => format!("OK:{field} set"),
                    Err(e) => format!("ERROR:{e}"),
                }
            }

            AppCommand::ToggleLoad(secs) => match app.request_temp_off(secs, now_ms, hw, sink) {
                TempOffOutcome::Started => format!("OK:load off for {secs}s"),
                TempOffOutcome::AlreadyOff => "OK:load already off".to_string(),
                TempOffOutcome::InvalidDuration => {
                    "ERROR:duration out of range (1-300)".to_string()
                }
            },

            AppCommand::CancelTempOff => {
                if app.cancel_temp_off(now_ms, hw, sink) {
                    "OK:temp off cancelled".to_string()
                } else {
                    "OK:no temp off active".to_string()
                }
            }

            AppCommand::GetCrashLog => {
                let entries = self.crash_log.read_all(storage);
                let metrics = RuntimeMetrics::collect(
                    app.uptime_secs(),
                    app.tick_count(),
                    app.fault_count(),
                    entries.len() as u32,
                );
                let report = CrashReport { entries, metrics };
                match serde_json::to_string(&report) {
                    Ok(json) => format!("CRASH:{json}"),
                    Err(_) => "ERROR:crash log encoding failed".to_string(),
                }
            }
        }
    }
}

impl Default for ConsoleEngine {
    fn default() -> Self {
        Self::new()
    }
}

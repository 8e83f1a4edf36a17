//! Fuzz target: `CrashLog` NVS ring buffer
//!
//! Interprets fuzz bytes as an operation stream (write / clear /
//! reinit) against an in-memory NVS and checks the ring invariants:
//! never more than 4 entries, clear really empties the ring, and a
//! reinit always lands the persisted write index back inside it.
//!
//! cargo fuzz run fuzz_crash_log

#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use sunguard::app::ports::{StorageError, StoragePort};
use sunguard::diagnostics::{CrashEntry, CrashLog};

struct RamNvs {
    cells: HashMap<(String, String), Vec<u8>>,
}

impl RamNvs {
    fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }
}

impl StoragePort for RamNvs {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.cells.get(&(ns.to_string(), key.to_string())) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.cells
            .insert((ns.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.cells.contains_key(&(ns.to_string(), key.to_string()))
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.cells.remove(&(ns.to_string(), key.to_string()));
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut nvs = RamNvs::new();
    let mut log = CrashLog::new();
    log.init(&nvs);

    let mut bytes = data.iter().copied();
    while let Some(op) = bytes.next() {
        match op % 4 {
            0 | 1 => {
                // Reason text comes straight from the fuzz input; lossy
                // conversion keeps multibyte sequences in play.
                let n = bytes.next().unwrap_or(0) as usize % 96;
                let raw: Vec<u8> = bytes.by_ref().take(n).collect();
                let reason = String::from_utf8_lossy(&raw);
                let pc = u32::from(bytes.next().unwrap_or(0)) << 16;
                log.write_entry(&mut nvs, &CrashEntry::new(u64::from(op), &reason, pc));
            }
            2 => {
                log.clear(&mut nvs);
                assert!(log.read_all(&nvs).is_empty(), "clear must empty the ring");
            }
            _ => {
                // Reboot: a fresh log must pick up a valid index from NVS.
                log = CrashLog::new();
                log.init(&nvs);
            }
        }

        let entries = log.read_all(&nvs);
        assert!(entries.len() <= 4, "ring exceeded capacity: {}", entries.len());
        assert!(log.count(&nvs) <= 4);
        for e in &entries {
            assert!(e.reason.len() <= 63, "reason not truncated");
        }
    }
});

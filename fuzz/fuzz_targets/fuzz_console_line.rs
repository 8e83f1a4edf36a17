//! Fuzz target: console line accumulator and command parser
//!
//! Drives arbitrary byte sequences through `LineAccumulator::feed` and
//! parses every completed line, asserting that the codec never panics,
//! never yields a line past the length cap, and strips terminators.
//!
//! cargo fuzz run fuzz_console_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use sunguard::console::codec::{parse_command, LineAccumulator, MAX_LINE};

fuzz_target!(|data: &[u8]| {
    let mut acc = LineAccumulator::new();

    for &byte in data {
        if let Some(line) = acc.feed(byte) {
            assert!(line.len() <= MAX_LINE, "line exceeds cap: {}", line.len());
            assert!(!line.contains('\n'), "terminator leaked into line");
            assert!(!line.ends_with('\r'), "CR not stripped");

            // Every completed line must parse or fail with a typed error.
            let _ = parse_command(&line);
        }
    }

    // A newline must always drain the buffer, overflowed or not.
    let _ = acc.feed(b'\n');
    assert_eq!(acc.pending(), 0, "newline must resynchronise");
});

//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod charge_cycle_tests;
mod console_tests;
mod load_guard_tests;
mod mock_hw;

//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives a master-side poller
//! against real slave services over the loopback bus.  All tests run on
//! the host (x86_64) with no real hardware required.

mod end_to_end_tests;
mod mock_bus;
mod switch_tests;

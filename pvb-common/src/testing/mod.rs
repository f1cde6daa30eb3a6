//! Test support shared by unit and integration tests.

mod log;

pub use log::{TestGuard, TestLogEntry, TestLogger, TestPhase, init_global_test_logging};

//! JSONL run logs for tests.
//!
//! Test binaries install the global subscriber from a constructor:
//!
//! ```ignore
//! #[ctor::ctor]
//! fn setup() {
//!     pvb_common::testing::init_global_test_logging();
//! }
//! ```
//!
//! and open a [`TestGuard`] per test with [`test_guard!`](crate::test_guard).
//! Guards are inert unless `PVB_TEST_LOGGING=1` (or `CI`) is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once, PoisonError};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPhase {
    Setup,
    Execute,
    Verify,
}

impl TestPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Execute => "execute",
            Self::Verify => "verify",
        }
    }
}

impl std::fmt::Display for TestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a per-test log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLogEntry {
    pub at: DateTime<Utc>,
    pub test: String,
    pub phase: TestPhase,
    pub message: String,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

static GLOBAL_INIT: Once = Once::new();

/// Install the global test subscriber once per process.
///
/// Library and CLI events are filtered at `PVB_TEST_LOG_LEVEL` (default
/// `info`) and go to the test writer. With `PVB_TEST_LOG_FILE` set they are
/// also written there as JSON lines.
pub fn init_global_test_logging() {
    GLOBAL_INIT.call_once(|| {
        let level = std::env::var("PVB_TEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let filter = EnvFilter::try_new(format!("pvb_common={level},pvb={level}"))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let json_layer = std::env::var_os("PVB_TEST_LOG_FILE")
            .and_then(|path| open_log(Path::new(&path)))
            .map(|file| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_span_events(FmtSpan::CLOSE)
            });

        let console_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .compact();

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .with(console_layer)
            .try_init();
    });
}

fn open_log(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok()?;
    }
    File::create(path).ok()
}

/// `<target dir>/test-logs`.
fn log_dir() -> PathBuf {
    std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .or_else(|| {
            let cwd = std::env::current_dir().ok()?;
            cwd.ancestors()
                .map(|dir| dir.join("target"))
                .find(|target| target.is_dir())
        })
        .unwrap_or_else(|| PathBuf::from("target"))
        .join("test-logs")
}

/// Records the phases of one test to `test-logs/<test>.jsonl`.
pub struct TestLogger {
    test: String,
    started: Instant,
    entries: Mutex<Vec<TestLogEntry>>,
    sink: Option<Mutex<File>>,
}

impl TestLogger {
    pub fn for_test(test: &str) -> Self {
        let file_name = format!("{}.jsonl", test.replace(['/', '\\', ':'], "_"));
        let logger = Self {
            test: test.to_string(),
            started: Instant::now(),
            entries: Mutex::new(Vec::new()),
            sink: open_log(&log_dir().join(file_name)).map(Mutex::new),
        };
        logger.log(TestPhase::Setup, "started");
        logger
    }

    pub fn log(&self, phase: TestPhase, message: impl Into<String>) {
        self.push(phase, message.into(), None);
    }

    pub fn log_with_data(
        &self,
        phase: TestPhase,
        message: impl Into<String>,
        data: serde_json::Value,
    ) {
        self.push(phase, message.into(), Some(data));
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn entries(&self) -> Vec<TestLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, phase: TestPhase, message: String, data: Option<serde_json::Value>) {
        let entry = TestLogEntry {
            at: Utc::now(),
            test: self.test.clone(),
            phase,
            message,
            elapsed_ms: self.elapsed_ms(),
            data,
        };
        tracing::info!(test = %entry.test, %phase, elapsed_ms = entry.elapsed_ms, "{}", entry.message);

        if let Some(sink) = &self.sink
            && let Ok(line) = serde_json::to_string(&entry)
        {
            let _ = writeln!(sink.lock().unwrap_or_else(PoisonError::into_inner), "{line}");
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Writes the test outcome when dropped: `passed`, or `panicked` when the
/// test is unwinding.
pub struct TestGuard {
    logger: Option<TestLogger>,
}

impl TestGuard {
    pub fn new(test: &str) -> Self {
        let logger = logging_enabled().then(|| {
            init_global_test_logging();
            TestLogger::for_test(test)
        });
        Self { logger }
    }

    pub fn log(&self, phase: TestPhase, message: impl Into<String>) {
        if let Some(logger) = &self.logger {
            logger.log(phase, message);
        }
    }

    pub fn log_with_data(
        &self,
        phase: TestPhase,
        message: impl Into<String>,
        data: serde_json::Value,
    ) {
        if let Some(logger) = &self.logger {
            logger.log_with_data(phase, message, data);
        }
    }
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        if let Some(logger) = self.logger.take() {
            let outcome = if std::thread::panicking() {
                "panicked"
            } else {
                "passed"
            };
            logger.log(TestPhase::Verify, outcome);
        }
    }
}

fn logging_enabled() -> bool {
    match std::env::var("PVB_TEST_LOGGING").as_deref() {
        Ok("1" | "true") => true,
        Ok("0" | "false") => false,
        _ => std::env::var_os("CI").is_some(),
    }
}

/// Open a [`TestGuard`] named after the enclosing function.
#[macro_export]
macro_rules! test_guard {
    () => {{
        fn __here() {}
        fn __name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let path = __name_of(__here);
        let path = path.strip_suffix("::__here").unwrap_or(path);
        $crate::testing::TestGuard::new(path.rsplit("::").next().unwrap_or(path))
    }};
}

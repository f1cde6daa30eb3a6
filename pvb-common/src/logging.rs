//! Tracing subscriber setup for the `pvb` binary.
//!
//! Configuration comes from `PVB_LOG_LEVEL`, `PVB_LOG_FORMAT` (`pretty` or
//! `json`) and `PVB_LOG_FILE`. A log file always receives JSON lines through
//! a non-blocking writer whose guard must outlive the program.

use crate::config::EnvParser;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// Console output goes to stderr instead of stdout.
    pub stderr: bool,
    /// Environment problems found while building, reported once logging is up.
    pub env_warnings: Vec<String>,
}

impl LogConfig {
    pub fn from_env(default_level: &str) -> Self {
        Self::from_parser(EnvParser::new(), default_level)
    }

    pub fn from_parser(mut env: EnvParser, default_level: &str) -> Self {
        let level = env.get_log_level("LOG_LEVEL", default_level).value;
        let format = env
            .get_parsed("LOG_FORMAT", LogFormat::Pretty, "log format (pretty|json)")
            .value;
        let file = env.get_optional_string("LOG_FILE").value.map(PathBuf::from);
        let env_warnings = env.take_errors().iter().map(ToString::to_string).collect();
        Self {
            level,
            format,
            file,
            stderr: false,
            env_warnings,
        }
    }

    #[must_use]
    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("log file {} has no file name", .0.display())]
    FilePath(PathBuf),

    #[error("failed to create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps background log writers alive; drop at process exit.
#[must_use = "dropping the guards stops file logging"]
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LoggingError> {
    let filter = EnvFilter::try_new(&config.level)?;
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut guards = Vec::new();

    let console = if config.stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    layers.push(match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(console)
            .with_target(false)
            .compact()
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(console)
            .boxed(),
    });

    if let Some(path) = &config.file {
        let name = path
            .file_name()
            .ok_or_else(|| LoggingError::FilePath(path.clone()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        std::fs::create_dir_all(&dir).map_err(|source| LoggingError::Directory {
            path: dir.clone(),
            source,
        })?;
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    for problem in &config.env_warnings {
        warn!("ignoring logging override: {problem}");
    }

    Ok(LoggingGuards { _guards: guards })
}

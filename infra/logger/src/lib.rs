//! # Logger
//!
//! Diagnostics for the `qobs` command line. Build progress (`CC`, `LINK`, ...)
//! goes to stdout through plain prints, everything else is a `tracing` event
//! rendered on stderr, optionally mirrored into daily rolling files.
//!
//! * `RUST_LOG` overrides the level picked from `-v`/`-q`.
//! * [`LoggerBuilder::env_filter`] pins module directives instead
//!   (e.g., `"qobs_builder=trace"`).
//!
//! ## Example
//!
//! ```rust
//! use qobs_logger::Logger;
//!
//! let _logger = Logger::builder("qobs").verbosity(1, false).ansi(false).init().unwrap();
//! tracing::debug!("visible with -v");
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;

use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Rolled files kept per log directory.
const KEPT_LOG_FILES: usize = 7;
const LOG_FILE_SUFFIX: &str = "log";

/// Maps command line verbosity onto a level.
///
/// `quiet` wins over any number of `-v` flags.
#[must_use]
pub const fn level_from_verbosity(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Configures the global subscriber. Created by [`Logger::builder`].
#[derive(Debug)]
pub struct LoggerBuilder {
    name: String,
    level: LevelFilter,
    console: bool,
    ansi: bool,
    timestamps: bool,
    env_filter: Option<String>,
    log_dir: Option<PathBuf>,
    json_files: bool,
}

impl LoggerBuilder {
    /// Sets the level from `-v` count and `-q`.
    #[must_use = "The builder does nothing until `init` is called."]
    pub const fn verbosity(mut self, verbose: u8, quiet: bool) -> Self {
        self.level = level_from_verbosity(verbose, quiet);
        self
    }

    #[must_use = "The builder does nothing until `init` is called."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Explicit filter directives. `RUST_LOG` is ignored when set.
    #[must_use = "The builder does nothing until `init` is called."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Disables stderr output when `false`. A log directory is then required.
    #[must_use = "The builder does nothing until `init` is called."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    #[must_use = "The builder does nothing until `init` is called."]
    pub const fn ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    #[must_use = "The builder does nothing until `init` is called."]
    pub const fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Mirrors events into `<dir>/<name>.<date>.log`. `None` keeps console only.
    #[must_use = "The builder does nothing until `init` is called."]
    pub fn log_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.log_dir = dir.map(Into::into);
        self
    }

    /// Writes log files as JSON lines.
    #[must_use = "The builder does nothing until `init` is called."]
    pub const fn json_files(mut self, enabled: bool) -> Self {
        self.json_files = enabled;
        self
    }

    fn filter(&self) -> Result<EnvFilter, LoggerError> {
        let builder = EnvFilter::builder().with_default_directive(self.level.into());
        match &self.env_filter {
            None => Ok(builder.from_env_lossy()),
            Some(directives) => builder.parse(directives).map_err(|e| {
                LoggerError::InvalidConfiguration {
                    message: format!("bad filter `{directives}`: {e}").into(),
                    context: None,
                }
            }),
        }
    }

    #[allow(clippy::type_complexity)]
    fn file_layer<S>(
        &self,
        dir: &Path,
    ) -> Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard), LoggerError>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fs::create_dir_all(dir).map_err(|e| LoggerError::Internal {
            message: e.to_string().into(),
            context: Some(format!("Creating log directory {}", dir.display()).into()),
        })?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&self.name)
            .filename_suffix(LOG_FILE_SUFFIX)
            .max_log_files(KEPT_LOG_FILES)
            .build(dir)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let file = layer().with_writer(writer).with_ansi(false);
        let boxed = if self.json_files { file.json().boxed() } else { file.boxed() };
        Ok((boxed, guard))
    }

    /// Installs the global subscriber.
    ///
    /// # Errors
    /// Returns [`LoggerError::Subscriber`] if a subscriber is already installed,
    /// [`LoggerError::InvalidConfiguration`] for an empty name, a bad filter or
    /// no enabled output, and [`LoggerError::Appender`] if the log file cannot
    /// be opened.
    pub fn init(self) -> Result<Logger, LoggerError> {
        if self.name.trim().is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "logger name cannot be empty".into(),
                context: None,
            });
        }
        if !self.console && self.log_dir.is_none() {
            return Err(LoggerError::InvalidConfiguration {
                message: "console output is off and no log directory is set".into(),
                context: None,
            });
        }

        let filter = self.filter()?;
        let mut layers = Vec::new();

        if self.console {
            let console =
                layer().compact().with_target(false).with_ansi(self.ansi).with_writer(std::io::stderr);
            layers.push(if self.timestamps { console.boxed() } else { console.without_time().boxed() });
        }

        let guard = match &self.log_dir {
            Some(dir) => {
                let (file, guard) = self.file_layer(dir)?;
                layers.push(file);
                Some(guard)
            },
            None => None,
        };

        tracing_subscriber::registry().with(filter).with(layers).try_init()?;
        Ok(Logger { guard })
    }
}

/// The installed logging system. Keep it alive until exit so file logs are flushed.
#[must_use = "Dropping the logger stops the file writer thread."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Starts configuring a logger whose files are prefixed with `name`.
    #[must_use = "The builder does nothing until `init` is called."]
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder {
            name: name.into(),
            level: LevelFilter::INFO,
            console: true,
            ansi: true,
            timestamps: false,
            env_filter: None,
            log_dir: None,
            json_files: false,
        }
    }

    /// Whether events are also written to files.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.guard.is_some()
    }
}

//! Logging capability and tracing setup
//!
//! Discovery and registration report their progress through the [`Logger`]
//! trait. Callers inject an implementation through
//! [`OAuthContext`](crate::context::OAuthContext); when none is supplied the
//! built-in [`StderrLogger`] is used.
//!
//! Provided implementations:
//!
//! - [`StderrLogger`]    -- default sink, prefixed lines on stderr
//! - [`NoopLogger`]      -- discards everything
//! - [`TracingLogger`]   -- forwards to the `tracing` macros
//! - [`RecordingLogger`] -- keeps lines in memory for later inspection
//! - [`FnLogger`]        -- adapts any three callbacks (see [`wrap_logger`])

use std::borrow::Cow;
use std::fmt;
use std::io::Write as _;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Prefix used by the default stderr sink.
pub const DEFAULT_LOG_PREFIX: &str = "oauth-helpers";

/// A minimal three-level logging capability.
///
/// Implementations must never panic; logging is advisory and has no
/// influence on control flow.
pub trait Logger: Send + Sync {
    /// Records an informational message.
    fn info(&self, args: fmt::Arguments<'_>);

    /// Records a warning.
    fn warn(&self, args: fmt::Arguments<'_>);

    /// Records an error.
    fn error(&self, args: fmt::Arguments<'_>);
}

impl<T: Logger + ?Sized> Logger for &T {
    fn info(&self, args: fmt::Arguments<'_>) {
        (**self).info(args)
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        (**self).warn(args)
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        (**self).error(args)
    }
}

impl<T: Logger + ?Sized> Logger for Box<T> {
    fn info(&self, args: fmt::Arguments<'_>) {
        (**self).info(args)
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        (**self).warn(args)
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        (**self).error(args)
    }
}

impl<T: Logger + ?Sized> Logger for Arc<T> {
    fn info(&self, args: fmt::Arguments<'_>) {
        (**self).info(args)
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        (**self).warn(args)
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        (**self).error(args)
    }
}

/// Severity of a recorded log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Informational
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// StderrLogger
// ---------------------------------------------------------------------------

/// Writes `[prefix] <timestamp> LEVEL: message` lines to stderr.
///
/// Write failures are swallowed.
///
/// # Examples
///
/// ```
/// use oauth_helpers::logging::{Logger, StderrLogger};
///
/// let logger = StderrLogger::with_prefix("my-app");
/// logger.info(format_args!("discovered {} endpoints", 3));
/// ```
#[derive(Debug, Clone)]
pub struct StderrLogger {
    prefix: Cow<'static, str>,
}

impl StderrLogger {
    /// Creates the default sink using [`DEFAULT_LOG_PREFIX`].
    pub const fn new() -> Self {
        Self {
            prefix: Cow::Borrowed(DEFAULT_LOG_PREFIX),
        }
    }

    /// Creates a sink with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Cow::Owned(prefix.into()),
        }
    }

    /// Returns the prefix written before every line.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn write(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        let timestamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[{}] {} {}: {}", self.prefix, timestamp, level, args);
    }
}

impl Default for StderrLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for StderrLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        self.write(LogLevel::Info, args)
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.write(LogLevel::Warn, args)
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.write(LogLevel::Error, args)
    }
}

/// The sink used when a context carries no logger.
pub(crate) static DEFAULT_LOGGER: StderrLogger = StderrLogger::new();

// ---------------------------------------------------------------------------
// NoopLogger
// ---------------------------------------------------------------------------

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn info(&self, _args: fmt::Arguments<'_>) {}

    fn warn(&self, _args: fmt::Arguments<'_>) {}

    fn error(&self, _args: fmt::Arguments<'_>) {}
}

// ---------------------------------------------------------------------------
// TracingLogger
// ---------------------------------------------------------------------------

/// Forwards messages to `tracing` events under the `oauth_helpers` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "oauth_helpers", "{}", args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(target: "oauth_helpers", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "oauth_helpers", "{}", args);
    }
}

// ---------------------------------------------------------------------------
// RecordingLogger
// ---------------------------------------------------------------------------

/// A single line captured by [`RecordingLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity of the line
    pub level: LogLevel,
    /// Fully formatted message
    pub message: String,
}

/// Keeps every message in memory.
///
/// Useful for asserting which pipeline branches ran, and for callers that
/// want to surface discovery diagnostics in their own UI.
///
/// # Examples
///
/// ```
/// use oauth_helpers::logging::{LogLevel, Logger, RecordingLogger};
///
/// let logger = RecordingLogger::new();
/// logger.warn(format_args!("no WWW-Authenticate header present"));
///
/// assert!(logger.contains("WWW-Authenticate"));
/// assert!(logger.contains_at(LogLevel::Warn, "no WWW-Authenticate"));
/// assert!(!logger.contains_at(LogLevel::Info, "no WWW-Authenticate"));
/// ```
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every recorded line.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Returns `true` if any line at any level contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|r| r.message.contains(needle))
    }

    /// Returns `true` if a line at `level` contains `needle`.
    pub fn contains_at(&self, level: LogLevel, needle: &str) -> bool {
        self.lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }

    /// Drops every recorded line.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        self.lock().push(LogRecord {
            level,
            message: args.to_string(),
        });
    }

    // A panic in another holder must not turn logging into a panic here.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Logger for RecordingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        self.push(LogLevel::Info, args)
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.push(LogLevel::Warn, args)
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.push(LogLevel::Error, args)
    }
}

// ---------------------------------------------------------------------------
// FnLogger
// ---------------------------------------------------------------------------

/// Adapts three callbacks into a [`Logger`].
///
/// Lets an existing application logger satisfy the capability without
/// implementing the trait itself. Build one with [`wrap_logger`].
pub struct FnLogger<I, W, E> {
    info: I,
    warn: W,
    error: E,
}

impl<I, W, E> fmt::Debug for FnLogger<I, W, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLogger").finish_non_exhaustive()
    }
}

impl<I, W, E> Logger for FnLogger<I, W, E>
where
    I: Fn(&str) + Send + Sync,
    W: Fn(&str) + Send + Sync,
    E: Fn(&str) + Send + Sync,
{
    fn info(&self, args: fmt::Arguments<'_>) {
        (self.info)(&args.to_string())
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        (self.warn)(&args.to_string())
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        (self.error)(&args.to_string())
    }
}

/// Wraps any three `Fn(&str)` callbacks as a [`Logger`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use oauth_helpers::context::OAuthContext;
/// use oauth_helpers::logging::wrap_logger;
///
/// let logger = wrap_logger(
///     |msg| println!("info: {msg}"),
///     |msg| println!("warn: {msg}"),
///     |msg| println!("error: {msg}"),
/// );
/// let ctx = OAuthContext::new().with_logger(Arc::new(logger));
/// ctx.logger().info(format_args!("ready"));
/// ```
pub fn wrap_logger<I, W, E>(info: I, warn: W, error: E) -> FnLogger<I, W, E>
where
    I: Fn(&str) + Send + Sync,
    W: Fn(&str) + Send + Sync,
    E: Fn(&str) + Send + Sync,
{
    FnLogger { info, warn, error }
}

// ---------------------------------------------------------------------------
// tracing subscriber setup
// ---------------------------------------------------------------------------

/// Installs the global `tracing` subscriber for the command-line binary.
///
/// `RUST_LOG` takes precedence over the configured level; `verbose` forces
/// `debug`. Output goes to stderr so stdout stays machine readable.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_format {
        let layer = tracing_fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    } else {
        let layer = tracing_fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    }

    Ok(())
}

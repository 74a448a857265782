//! Diagnostic output for georun.
//!
//! Diagnostics go through `tracing` and are written to stderr; stdout is
//! reserved for session listings and JSON.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much diagnostic output to emit, picked with `-q`, `-v` and `-vv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings, e.g. skipped feed lines.
    #[default]
    Normal,
    /// Session lifecycle events as well.
    Verbose,
    /// Everything, down to individual fixes.
    Trace,
}

impl Verbosity {
    /// Map the `-q` flag and the number of `-v` flags. `-q` wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// The most detailed level emitted.
    #[must_use]
    pub fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    fn directive(self) -> String {
        format!("georun={}", self.level())
    }
}

/// Install the global stderr subscriber.
///
/// `RUST_LOG`, when set, replaces the filter derived from `verbosity`.
/// Calling this again after a subscriber is installed does nothing.
///
/// ```no_run
/// use georun::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .try_init();
}

/// Route warnings from the crate into the test harness output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("georun=warn")
        .with_test_writer()
        .try_init();
}

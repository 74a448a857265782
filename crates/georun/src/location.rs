//! Location update subscription.
//!
//! A [`LocationSource`] pushes [`LocationFix`]es into a bounded channel until
//! it is stopped or runs dry. The [`SubscriptionHandle`] is the cancellation
//! signal shared between the source and whoever consumes its fixes.
//!
//! The bundled [`JsonLinesSource`] reads newline-delimited JSON such as
//!
//! ```text
//! {"lat": 55.7558, "lon": 37.6173, "timestamp": "2024-05-01T07:30:00Z"}
//! {"lat": 55.7561, "lon": 37.6180}
//! ```
//!
//! from a file or from standard input (`-`), so any GPS daemon or logger that
//! can print JSON can feed the tracker.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::STDIN_SOURCE;
use crate::error::{Error, Result};
use crate::track::LocationFix;

/// Whether the process may read locations from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatus {
    /// Whether location access is granted.
    pub granted: bool,
    /// Human-readable description of the status.
    pub description: String,
}

impl PermissionStatus {
    /// Create a granted status.
    #[must_use]
    pub fn granted(description: impl Into<String>) -> Self {
        Self {
            granted: true,
            description: description.into(),
        }
    }

    /// Create a denied status.
    #[must_use]
    pub fn denied(description: impl Into<String>) -> Self {
        Self {
            granted: false,
            description: description.into(),
        }
    }
}

/// A provider of location updates.
///
/// Implementors deliver fixes through the channel passed to [`start`] until
/// [`stop`] is called or they have nothing more to deliver, at which point
/// they drop the sender.
///
/// [`start`]: LocationSource::start
/// [`stop`]: LocationSource::stop
#[async_trait::async_trait]
pub trait LocationSource: Send + Sync {
    /// The name of this source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Check whether location access is available.
    fn permission(&self) -> PermissionStatus;

    /// Shorthand for `self.permission().granted`.
    fn has_permission(&self) -> bool {
        self.permission().granted
    }

    /// Start delivering fixes.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is already running or cannot be opened.
    async fn start(&mut self, tx: mpsc::Sender<LocationFix>) -> Result<()>;

    /// Stop delivering fixes.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to stop cleanly.
    fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently delivering fixes.
    fn is_running(&self) -> bool;
}

/// A cloneable cancellation signal for a location subscription.
///
/// All clones share the same signal; stopping one stops them all.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    stop_signal: Arc<watch::Sender<bool>>,
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionHandle {
    /// Create a new, not yet cancelled handle.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            stop_signal: Arc::new(tx),
        }
    }

    /// Signal the subscription to stop.
    pub fn stop(&self) {
        self.stop_signal.send_replace(true);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        *self.stop_signal.borrow()
    }

    /// Reset the stop signal.
    pub fn reset(&self) {
        self.stop_signal.send_replace(false);
    }

    /// Resolve once the stop signal has been sent.
    pub async fn cancelled(&self) {
        let mut rx = self.stop_signal.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// One line of a JSON-lines location feed.
#[derive(Debug, Deserialize)]
struct FixLine {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lon: f64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Parse one line of a JSON-lines feed.
///
/// Blank lines and lines starting with `#` yield `Ok(None)`. A missing
/// timestamp is replaced by the current time.
///
/// # Errors
///
/// Returns [`Error::Json`] for malformed lines and
/// [`Error::InvalidCoordinate`] for out-of-range positions.
pub fn parse_fix_line(line: &str) -> Result<Option<LocationFix>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let parsed: FixLine = serde_json::from_str(line)?;
    let fix = LocationFix::at(
        parsed.lat,
        parsed.lon,
        parsed.timestamp.unwrap_or_else(Utc::now),
    );
    fix.validate()?;
    Ok(Some(fix))
}

/// Reads fixes from a JSON-lines file or standard input.
#[derive(Debug)]
pub struct JsonLinesSource {
    path: PathBuf,
    replay_interval: Option<Duration>,
    handle: SubscriptionHandle,
    running: Arc<AtomicBool>,
}

impl JsonLinesSource {
    /// Source name used in logs and errors.
    pub const NAME: &'static str = "json-lines";

    /// Create a source reading from `path` (`-` for standard input).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            replay_interval: None,
            handle: SubscriptionHandle::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pace delivery with a delay between consecutive fixes.
    #[must_use]
    pub fn with_replay_interval(mut self, interval: Option<Duration>) -> Self {
        self.replay_interval = interval;
        self
    }

    /// The path being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_stdin(&self) -> bool {
        self.path.as_os_str() == STDIN_SOURCE
    }

    async fn open_reader(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
        if self.is_stdin() {
            return Ok(Box::new(BufReader::new(tokio::io::stdin())));
        }

        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            Error::location_source_start(Self::NAME, format!("{}: {e}", self.path.display()))
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[async_trait::async_trait]
impl LocationSource for JsonLinesSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn permission(&self) -> PermissionStatus {
        if self.is_stdin() {
            return PermissionStatus::granted("reading locations from standard input");
        }

        let path = self.path.display();
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) => {
                return PermissionStatus::denied(format!(
                    "location feed {path} is not readable: {e}"
                ));
            }
        };
        if metadata.is_dir() {
            return PermissionStatus::denied(format!(
                "location feed {path} is a directory, not a file"
            ));
        }
        // Opening a FIFO blocks until a writer appears.
        if !metadata.is_file() {
            return PermissionStatus::granted(format!("location feed {path} exists"));
        }

        match std::fs::File::open(&self.path) {
            Ok(_) => PermissionStatus::granted(format!("location feed {path} is readable")),
            Err(e) => PermissionStatus::denied(format!(
                "location feed {path} is not readable: {e}"
            )),
        }
    }

    async fn start(&mut self, tx: mpsc::Sender<LocationFix>) -> Result<()> {
        if self.is_running() {
            return Err(Error::location_source_start(Self::NAME, "already running"));
        }

        let reader = self.open_reader().await?;

        // A pump from an earlier run may still be winding down; it keeps the
        // old handle and flag.
        self.handle = SubscriptionHandle::new();
        self.running = Arc::new(AtomicBool::new(true));

        let handle = self.handle.clone();
        let running = Arc::clone(&self.running);
        let interval = self.replay_interval;
        let source = self.path.display().to_string();

        info!("Reading locations from {}", source);
        tokio::spawn(async move {
            let delivered = pump_fixes(reader, tx, &handle, interval).await;
            running.store(false, Ordering::SeqCst);
            debug!("Location feed {} finished after {} fixes", source, delivered);
        });

        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.handle.stop();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Forward parsed fixes until the reader is exhausted, the receiver goes
/// away or the handle is cancelled. Returns the number of fixes delivered.
async fn pump_fixes(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    tx: mpsc::Sender<LocationFix>,
    handle: &SubscriptionHandle,
    interval: Option<Duration>,
) -> u64 {
    let mut lines = reader.lines();
    let mut delivered = 0;
    let mut line_no = 0_u64;

    loop {
        let next = tokio::select! {
            biased;
            () = handle.cancelled() => break,
            next = lines.next_line() => next,
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read location feed: {}", e);
                break;
            }
        };
        line_no += 1;

        let fix = match parse_fix_line(&line) {
            Ok(Some(fix)) => fix,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping line {} of location feed: {}", line_no, e);
                continue;
            }
        };

        if tx.send(fix).await.is_err() {
            debug!("Location receiver closed");
            break;
        }
        delivered += 1;

        if let Some(interval) = interval {
            tokio::select! {
                biased;
                () = handle.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    delivered
}

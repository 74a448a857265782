//! Tracking state machine.
//!
//! The [`Tracker`] owns the location source and switches between
//! [`TrackerState::Idle`] and [`TrackerState::Tracking`]. While tracking, a
//! recorder task stores every fix against the open session and publishes it
//! as the latest known location.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::location::{LocationSource, SubscriptionHandle};
use crate::storage::Storage;
use crate::track::{Coordinate, LocationFix, SessionId, TrackSession};

/// Default capacity of the fix channel between source and recorder.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Storage shared between the tracker and its recorder task.
pub type SharedStorage = Arc<Mutex<Storage>>;

/// Current tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackerState {
    /// Not recording.
    #[default]
    Idle,
    /// Recording into an open session.
    Tracking {
        /// The session receiving fixes.
        session_id: SessionId,
        /// When tracking started.
        started_at: DateTime<Utc>,
    },
}

impl TrackerState {
    /// Check if a session is being recorded.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        matches!(self, Self::Tracking { .. })
    }

    /// The session being recorded, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Idle => None,
            Self::Tracking { session_id, .. } => Some(*session_id),
        }
    }
}

/// Result of [`Tracker::toggle`].
#[derive(Debug, Clone, PartialEq)]
pub enum Toggled {
    /// Tracking started into a new session.
    Started(SessionId),
    /// Tracking stopped; carries the closed session.
    Stopped(Option<TrackSession>),
}

/// Records location fixes into track sessions.
pub struct Tracker {
    storage: SharedStorage,
    source: Box<dyn LocationSource>,
    state: TrackerState,
    handle: SubscriptionHandle,
    recorder: Option<JoinHandle<Result<u64>>>,
    latest: Arc<watch::Sender<Option<LocationFix>>>,
    recorder_done: Arc<watch::Sender<bool>>,
    channel_capacity: usize,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("source", &self.source.name())
            .field("state", &self.state)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Create an idle tracker.
    #[must_use]
    pub fn new(storage: SharedStorage, source: Box<dyn LocationSource>) -> Self {
        let (latest, _) = watch::channel(None);
        let (recorder_done, _) = watch::channel(false);
        Self {
            storage,
            source,
            state: TrackerState::Idle,
            handle: SubscriptionHandle::new(),
            recorder: None,
            latest: Arc::new(latest),
            recorder_done: Arc::new(recorder_done),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the capacity of the fix channel. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Check if a session is being recorded.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.state.is_tracking()
    }

    /// Start recording a new session.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyTracking`] if a session is already being recorded
    /// - [`Error::PermissionMissing`] if the source has no location access;
    ///   no session is created
    /// - any error from the store or from starting the source; a session
    ///   created for this attempt is removed again
    pub async fn start(&mut self) -> Result<SessionId> {
        if let TrackerState::Tracking { session_id, .. } = self.state {
            return Err(Error::AlreadyTracking(session_id));
        }

        let permission = self.source.permission();
        if !permission.granted {
            warn!("Location access unavailable: {}", permission.description);
            return Err(Error::permission_missing(
                "location access",
                permission.description,
            ));
        }

        let started_at = Utc::now();
        let session_id = self.with_storage(|s| s.start_session(started_at))?;

        self.handle.reset();
        self.recorder_done.send_replace(false);

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        if let Err(e) = self.source.start(tx).await {
            warn!("Failed to start {} source: {}", self.source.name(), e);
            if let Err(cleanup) = self.with_storage(|s| s.delete_session(session_id)) {
                warn!("Failed to remove session {}: {}", session_id, cleanup);
            }
            return Err(e);
        }

        self.recorder = Some(tokio::spawn(record_fixes(
            Arc::clone(&self.storage),
            session_id,
            rx,
            self.handle.clone(),
            Arc::clone(&self.latest),
            Arc::clone(&self.recorder_done),
        )));
        self.state = TrackerState::Tracking {
            session_id,
            started_at,
        };

        info!("Tracking started, session {}", session_id);
        Ok(session_id)
    }

    /// Stop recording and close the session.
    ///
    /// Returns `Ok(None)` when nothing was being recorded. Fixes already
    /// queued by the source are stored before the session is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be closed.
    pub async fn stop(&mut self) -> Result<Option<TrackSession>> {
        let TrackerState::Tracking { session_id, .. } = self.state else {
            debug!("Stop requested while idle");
            return Ok(None);
        };

        self.handle.stop();
        if let Err(e) = self.source.stop() {
            warn!("Failed to stop {} source: {}", self.source.name(), e);
        }

        if let Some(recorder) = self.recorder.take() {
            match recorder.await {
                Ok(Ok(stored)) => debug!("Recorder stored {} fixes", stored),
                Ok(Err(e)) => warn!("Recorder for session {} failed: {}", session_id, e),
                Err(e) => warn!("Recorder task for session {} aborted: {}", session_id, e),
            }
        }

        self.state = TrackerState::Idle;
        let session = self.with_storage(|s| s.end_session(session_id, Utc::now()))?;

        info!(
            "Tracking stopped, session {} covered {}",
            session_id,
            session.distance.unwrap_or_default()
        );
        Ok(Some(session))
    }

    /// Start when idle, stop when tracking.
    ///
    /// # Errors
    ///
    /// Returns the error of [`start`](Self::start) or [`stop`](Self::stop).
    pub async fn toggle(&mut self) -> Result<Toggled> {
        if self.is_tracking() {
            self.stop().await.map(Toggled::Stopped)
        } else {
            self.start().await.map(Toggled::Started)
        }
    }

    /// The most recent fix, if any has been received.
    #[must_use]
    pub fn latest_location(&self) -> Option<LocationFix> {
        *self.latest.borrow()
    }

    /// Subscribe to location updates.
    #[must_use]
    pub fn subscribe_location(&self) -> watch::Receiver<Option<LocationFix>> {
        self.latest.subscribe()
    }

    /// Wait until the recorder has nothing more to read.
    ///
    /// Returns immediately when idle. For finite sources this resolves once
    /// every fix has been stored.
    pub async fn wait_for_source_end(&self) {
        if !self.is_tracking() {
            return;
        }
        let mut rx = self.recorder_done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// All closed sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn sessions(&self) -> Result<Vec<TrackSession>> {
        self.with_storage(Storage::list_sessions)
    }

    /// The coordinates of a session in recording order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn coordinates(&self, id: SessionId) -> Result<Vec<Coordinate>> {
        self.with_storage(|s| s.coordinates(id))
    }

    /// Delete a session and its coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionActive`] for the session being recorded.
    pub fn delete_session(&self, id: SessionId) -> Result<bool> {
        if self.state.session_id() == Some(id) {
            return Err(Error::SessionActive(id));
        }
        self.with_storage(|s| s.delete_session(id))
    }

    fn with_storage<T>(&self, f: impl FnOnce(&Storage) -> Result<T>) -> Result<T> {
        let storage = self
            .storage
            .lock()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        f(&storage)
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if self.is_tracking() {
            self.handle.stop();
            let _ = self.source.stop();
        }
    }
}

/// Run the recorder and flag completion however it ends.
async fn record_fixes(
    storage: SharedStorage,
    session_id: SessionId,
    rx: mpsc::Receiver<LocationFix>,
    handle: SubscriptionHandle,
    latest: Arc<watch::Sender<Option<LocationFix>>>,
    done: Arc<watch::Sender<bool>>,
) -> Result<u64> {
    let result = pump_into_session(&storage, session_id, rx, &handle, &latest).await;
    done.send_replace(true);
    result
}

/// Store fixes until cancelled or the source hangs up. After cancellation
/// the fixes already queued are still stored.
async fn pump_into_session(
    storage: &SharedStorage,
    session_id: SessionId,
    mut rx: mpsc::Receiver<LocationFix>,
    handle: &SubscriptionHandle,
    latest: &watch::Sender<Option<LocationFix>>,
) -> Result<u64> {
    let mut stored = 0;
    loop {
        let fix = tokio::select! {
            biased;
            () = handle.cancelled() => break,
            fix = rx.recv() => fix,
        };
        let Some(fix) = fix else {
            debug!("Location source for session {} finished", session_id);
            return Ok(stored);
        };
        stored += store_fix(storage, session_id, &fix, latest)?;
    }

    rx.close();
    while let Some(fix) = rx.recv().await {
        stored += store_fix(storage, session_id, &fix, latest)?;
    }
    Ok(stored)
}

/// Store one fix. Out-of-range fixes are skipped and count as zero.
fn store_fix(
    storage: &SharedStorage,
    session_id: SessionId,
    fix: &LocationFix,
    latest: &watch::Sender<Option<LocationFix>>,
) -> Result<u64> {
    let storage = storage
        .lock()
        .map_err(|_| Error::internal("storage lock poisoned"))?;

    match storage.add_coordinate(session_id, fix) {
        Ok(_) => {
            latest.send_replace(Some(*fix));
            Ok(1)
        }
        Err(Error::InvalidCoordinate { .. }) => {
            warn!("Dropping out-of-range fix: {}", fix);
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

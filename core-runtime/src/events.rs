//! # Event Bus System
//!
//! Typed publish/subscribe over `tokio::sync::broadcast`. Services publish
//! library, scan and playback state changes here; a UI layer subscribes and
//! re-renders from the events instead of polling.
//!
//! ```text
//! ┌──────────────┐  emit  ┌───────────┐  subscribe  ┌────────────┐
//! │ LibraryScan  ├───────>│           ├────────────>│ Subscriber │
//! └──────────────┘        │ EventBus  │             └────────────┘
//! ┌──────────────┐  emit  │           │  subscribe  ┌────────────┐
//! │ Player       ├───────>│           ├────────────>│ Subscriber │
//! └──────────────┘        └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Library(LibraryEvent::PlaylistCreated {
//!     playlist_id: "p-1".to_string(),
//!     name: "Road trip".to_string(),
//! }))
//! .ok();
//!
//! assert!(rx.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind than this receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Library content changes
    Library(LibraryEvent),
    /// Directory scan lifecycle and progress
    Scan(ScanEvent),
    /// Player state changes
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Scan(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Scan(ScanEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Scan(ScanEvent::Completed { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Scan(ScanEvent::Started { .. })
            | CoreEvent::Scan(ScanEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::LibraryCreated { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to library content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A library root was registered.
    LibraryCreated {
        library_id: String,
        name: String,
    },
    /// New artist created by a scan or by hand.
    ArtistAdded {
        artist_id: String,
        name: String,
    },
    /// New album created.
    AlbumAdded {
        album_id: String,
        title: String,
        artist: Option<String>,
    },
    /// New track added to library.
    TrackAdded {
        track_id: String,
        title: String,
        artist: Option<String>,
        album: Option<String>,
    },
    /// Existing track row refreshed from its file.
    TrackUpdated { track_id: String },
    /// Track removed from library.
    TrackDeleted { track_id: String },
    /// New playlist created.
    PlaylistCreated { playlist_id: String, name: String },
    /// Playlist modified (renamed, items added, removed or moved).
    PlaylistUpdated {
        playlist_id: String,
        /// What changed (e.g., "renamed", "item_added", "item_removed", "item_moved").
        change_type: String,
    },
    /// Playlist deleted.
    PlaylistDeleted { playlist_id: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::LibraryCreated { .. } => "Library created",
            LibraryEvent::ArtistAdded { .. } => "Artist added to library",
            LibraryEvent::AlbumAdded { .. } => "Album added to library",
            LibraryEvent::TrackAdded { .. } => "Track added to library",
            LibraryEvent::TrackUpdated { .. } => "Track metadata updated",
            LibraryEvent::TrackDeleted { .. } => "Track removed from library",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
        }
    }
}

// ============================================================================
// Scan Events
// ============================================================================

/// Events emitted while a library directory is being scanned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ScanEvent {
    /// Enumeration finished and import is about to begin.
    Started {
        library_id: String,
        total_files: u64,
    },
    /// One more file processed.
    Progress {
        library_id: String,
        scanned_files: u64,
        total_files: u64,
        /// Fraction complete in `[0.0, 1.0]`.
        percentage: f64,
        current_file: Option<String>,
    },
    /// Scan finished.
    Completed {
        library_id: String,
        total_files: u64,
        scanned_files: u64,
        imported: u64,
        /// Files whose track already existed and was refreshed.
        updated: u64,
        failed: u64,
        duration_secs: u64,
    },
    /// Scan aborted before completion.
    Failed { library_id: String, message: String },
}

impl ScanEvent {
    fn description(&self) -> &str {
        match self {
            ScanEvent::Started { .. } => "Library scan started",
            ScanEvent::Progress { .. } => "Library scan progress",
            ScanEvent::Completed { .. } => "Library scan completed",
            ScanEvent::Failed { .. } => "Library scan failed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    Started {
        track_id: String,
        title: String,
        duration_ms: Option<u64>,
    },
    Paused {
        track_id: String,
        position_ms: u64,
    },
    Resumed {
        track_id: String,
        position_ms: u64,
    },
    Stopped { track_id: Option<String> },
    /// Current track reached its end.
    Completed { track_id: String },
    Seeked {
        track_id: String,
        position_ms: u64,
    },
    VolumeChanged { volume: f32 },
    /// Play queue replaced or reordered.
    QueueChanged { length: usize },
    Error {
        track_id: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::QueueChanged { .. } => "Play queue changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; `CoreConfig` validation rejects that
    /// value before a bus is built from it.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none. Publishers usually ignore that error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribe and wrap the receiver in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let bus = EventBus::default();
/// let scans_only = bus.stream().filter(|event| matches!(event, CoreEvent::Scan(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drain everything currently buffered that passes the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

//! Cadence workspace crate.
//!
//! Re-exports the service façade and the library model so host applications
//! can depend on `cadence` alone instead of wiring each workspace crate.

pub use core_library::{
    duration::format_duration,
    models::{Album, Artist, Library, Playlist, PlaylistItem, Track, User},
    Page, PageRequest,
};
pub use core_service::{ApiServer, CoreService, ServiceError};

pub use core_playback::{
    NowPlaying, PlaybackAdapter, PlaybackError, PlaybackState, QueueItem, RepeatMode, SilentAdapter,
};

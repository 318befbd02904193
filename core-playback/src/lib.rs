//! # Playback
//!
//! Decoding, the play queue and the player state machine.
//!
//! - [`traits`]: audio types plus the [`AudioDecoder`] and [`PlaybackAdapter`] seams
//! - [`decoder`]: symphonia-backed decoding (feature `decoder`, on by default)
//! - [`queue`]: [`PlayQueue`] with cursor and [`RepeatMode`]
//! - [`player`]: [`Player`], driving a host adapter and publishing
//!   `CoreEvent::Playback`
//! - [`adapter`]: [`SilentAdapter`], an output that plays nothing

pub mod adapter;
#[cfg(feature = "decoder")]
pub mod decoder;
pub mod error;
pub mod player;
pub mod queue;
pub mod traits;

pub use adapter::SilentAdapter;
#[cfg(feature = "decoder")]
pub use decoder::{FormatDetector, SampleConverter, SymphoniaDecoder};
pub use error::{PlaybackError, Result};
pub use player::{NowPlaying, PlaybackState, Player, PREVIOUS_RESTART_THRESHOLD};
pub use queue::{PlayQueue, QueueItem, RepeatMode};
pub use traits::{
    AudioCodec, AudioDecoder, AudioFormat, AudioFrameChunk, AudioSource, PlaybackAdapter,
    ProbeResult,
};

//! # Playback Error Types

use crate::player::PlaybackState;
use thiserror::Error;

/// Errors that can occur during decoding and playback control.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Failed to open or read audio source.
    #[error("Failed to open audio source: {0}")]
    SourceError(String),

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Audio format is not recognized or cannot be parsed.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Codec is not supported by the decoder.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Audio format was detected but cannot be decoded.
    #[error("Cannot decode audio format: {0}")]
    FormatNotDecodable(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Audio stream contains invalid data.
    #[error("Corrupted audio stream: {0}")]
    CorruptedStream(String),

    #[error("Decoder internal error: {0}")]
    DecoderError(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    #[error("Seeking not supported")]
    SeekNotSupported,

    #[error("Seek position out of bounds: {0:?}")]
    SeekOutOfBounds(std::time::Duration),

    /// Operation needs a current track but the queue cursor is unset.
    #[error("No track loaded")]
    NoTrackLoaded,

    #[error("Play queue is empty")]
    EmptyQueue,

    /// Queue index outside `0..len`.
    #[error("Queue index {index} out of range (queue length {len})")]
    QueueIndexOutOfRange { index: usize, len: usize },

    /// Volume was not a number.
    #[error("Invalid volume: {0}")]
    InvalidVolume(f32),

    /// Transition not allowed from the current player state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PlaybackState,
    },

    // ========================================================================
    // Platform/Adapter Errors
    // ========================================================================
    /// Host audio output failed.
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Host audio output is temporarily unavailable.
    #[error("Audio device unavailable: {0}")]
    AudioDeviceUnavailable(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::AudioDeviceUnavailable(_))
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidFormat(_)
                | PlaybackError::UnsupportedCodec(_)
                | PlaybackError::FormatNotDecodable(_)
        )
    }

    pub(crate) fn invalid_state(operation: &'static str, state: PlaybackState) -> Self {
        PlaybackError::InvalidState { operation, state }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

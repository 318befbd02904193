//! # Core Playback Traits
//!
//! Abstractions shared by the decoder and the player.
//!
//! - [`AudioDecoder`] turns an [`AudioSource`] into interleaved `f32` PCM.
//! - [`PlaybackAdapter`] is the host's audio output. The core never talks to
//!   an audio device itself; the host hands an adapter to the player and the
//!   player drives it.
//!
//! ```rust,no_run
//! use core_playback::{AudioDecoder, AudioFormat, AudioSource, PlaybackAdapter};
//!
//! async fn example(adapter: impl PlaybackAdapter, mut decoder: impl AudioDecoder) {
//!     let probe = decoder.probe().await.expect("probe");
//!     adapter
//!         .play(AudioSource::LocalFile { path: "/music/song.flac".into() }, probe.format)
//!         .await
//!         .expect("play");
//! }
//! ```

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Audio Format Types
// ============================================================================

/// Audio codecs the core knows by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MPEG-1 Audio Layer 3
    Mp3,
    /// Advanced Audio Coding (AAC/M4A)
    Aac,
    /// Free Lossless Audio Codec
    Flac,
    /// Ogg Vorbis
    Vorbis,
    Opus,
    /// PCM in a WAV/AIFF container
    Wav,
    /// Apple Lossless Audio Codec
    Alac,
    Unknown,
    /// Recognized by name but not decodable here (e.g. "wma")
    Other(String),
}

impl AudioCodec {
    /// Returns `true` if this is a lossless codec.
    pub fn is_lossless(&self) -> bool {
        matches!(self, AudioCodec::Flac | AudioCodec::Wav | AudioCodec::Alac)
    }

    /// Returns `true` if this codec is lossy.
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            AudioCodec::Mp3 | AudioCodec::Aac | AudioCodec::Vorbis | AudioCodec::Opus
        )
    }

    /// Best guess from a file extension (case-insensitive, no leading dot).
    ///
    /// `m4a` is reported as AAC; an ALAC stream in an MP4 container is only
    /// told apart by probing.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" => AudioCodec::Mp3,
            "aac" | "m4a" | "mp4" => AudioCodec::Aac,
            "flac" => AudioCodec::Flac,
            "ogg" | "oga" => AudioCodec::Vorbis,
            "opus" => AudioCodec::Opus,
            "wav" | "wave" | "aif" | "aiff" => AudioCodec::Wav,
            "alac" => AudioCodec::Alac,
            "" => AudioCodec::Unknown,
            other => AudioCodec::Other(other.to_string()),
        }
    }

    /// Codec implied by the extension of `path`.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(AudioCodec::Unknown)
    }
}

/// Audio format metadata describing decoded PCM output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Source codec (before decoding)
    pub codec: AudioCodec,
    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo, etc.)
    pub channels: u16,
    /// Bits per sample in the source format (e.g., 16, 24)
    pub bits_per_sample: Option<u16>,
    /// Average bitrate in kbps (for lossy codecs)
    pub bitrate: Option<u32>,
}

impl AudioFormat {
    pub fn new(
        codec: AudioCodec,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: Option<u16>,
        bitrate: Option<u32>,
    ) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
            bits_per_sample,
            bitrate,
        }
    }

    /// Standard CD quality (44.1 kHz, 16-bit stereo)
    pub fn cd_quality() -> Self {
        Self::new(AudioCodec::Wav, 44100, 2, Some(16), None)
    }

    /// High-resolution audio (96 kHz, 24-bit stereo)
    pub fn hi_res() -> Self {
        Self::new(AudioCodec::Flac, 96000, 2, Some(24), None)
    }
}

// ============================================================================
// Audio Source Types
// ============================================================================

/// Where encoded audio comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Audio file on the local filesystem.
    LocalFile { path: PathBuf },

    /// Encoded audio already held in memory.
    CachedChunk {
        /// Raw encoded bytes (not PCM)
        data: Bytes,
        /// Optional hint about the source codec
        codec_hint: Option<AudioCodec>,
    },
}

impl AudioSource {
    /// Returns `true` if the audio data is already in memory.
    pub fn is_cached(&self) -> bool {
        matches!(self, AudioSource::CachedChunk { .. })
    }

    /// Filesystem path, for file-backed sources.
    pub fn path(&self) -> Option<&Path> {
        match self {
            AudioSource::LocalFile { path } => Some(path),
            AudioSource::CachedChunk { .. } => None,
        }
    }

    /// Returns the size in bytes, if known without touching the filesystem.
    pub fn estimated_size(&self) -> Option<usize> {
        match self {
            AudioSource::CachedChunk { data, .. } => Some(data.len()),
            AudioSource::LocalFile { .. } => None,
        }
    }
}

// ============================================================================
// Decoded Audio Data
// ============================================================================

/// A chunk of decoded PCM audio frames.
///
/// Samples are normalized to `[-1.0, 1.0]` and interleaved for multi-channel
/// audio (stereo is `L0 R0 L1 R1 ...`).
#[derive(Debug, Clone)]
pub struct AudioFrameChunk {
    pub samples: Vec<f32>,
    /// One frame = one sample per channel.
    pub frames: usize,
    /// Presentation timestamp of the first frame.
    pub timestamp: Duration,
}

impl AudioFrameChunk {
    pub fn new(samples: Vec<f32>, frames: usize, timestamp: Duration) -> Self {
        Self {
            samples,
            frames,
            timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0 || self.samples.is_empty()
    }

    /// Play time of this chunk at `sample_rate`.
    pub fn duration(&self, sample_rate: u32) -> Duration {
        if sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / f64::from(sample_rate))
    }
}

/// Result of probing an audio stream.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub format: AudioFormat,
    /// Total duration of the stream, if the container declares it
    pub duration: Option<Duration>,
    /// Container tags keyed by lowercase name (e.g. "title", "artist")
    pub tags: HashMap<String, String>,
}

impl ProbeResult {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            duration: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

// ============================================================================
// Core Traits
// ============================================================================

/// Converts encoded audio into PCM samples.
///
/// End of stream is `Ok(None)` from [`AudioDecoder::decode_frames`].
#[async_trait]
pub trait AudioDecoder: Send {
    /// Format, duration and tags of the stream.
    async fn probe(&mut self) -> Result<ProbeResult>;

    /// Decode up to `max_frames` frames from the current position.
    ///
    /// Never returns more than `max_frames` frames; decoded audio beyond that
    /// is kept for the next call.
    async fn decode_frames(&mut self, max_frames: usize) -> Result<Option<AudioFrameChunk>>;

    /// Seek to an absolute position.
    ///
    /// # Errors
    ///
    /// `SeekOutOfBounds` past the known duration, `SeekNotSupported` when the
    /// container cannot seek.
    async fn seek(&mut self, position: Duration) -> Result<()>;
}

/// Host audio output driven by the [`Player`](crate::Player).
///
/// Implementations should return quickly; the player holds its state lock
/// while calling them.
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Start playing `source` from the beginning.
    async fn play(&self, source: AudioSource, format: AudioFormat) -> Result<()>;

    /// Pause, keeping the position.
    async fn pause(&self) -> Result<()>;

    /// Continue from the paused position.
    async fn resume(&self) -> Result<()>;

    /// Stop and release the current source.
    async fn stop(&self) -> Result<()>;

    /// Seek within the current source.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Volume in `[0.0, 1.0]`; the player clamps before calling.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Elapsed time in the current source.
    async fn get_position(&self) -> Result<Duration>;

    async fn is_playing(&self) -> Result<bool>;
}

//! Audio Tag Extraction and Metadata Processing
//!
//! This module provides functionality for extracting metadata from audio files
//! using the `lofty` crate. It supports ID3v2, Vorbis Comments, MP4 tags,
//! FLAC and RIFF INFO.
//!
//! ## Overview
//!
//! - Extracts text metadata (title, artist, album, year, track/disc numbers, genre)
//! - Reads audio properties (duration, bitrate, sample rate, channels)
//! - Normalizes text (trims, collapses whitespace, drops control characters)
//! - Falls back to the file stem when a file carries no title
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::extractor::MetadataExtractor;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = MetadataExtractor::new();
//! let metadata = extractor.extract_from_file(Path::new("song.mp3")).await?;
//!
//! println!("Title: {}", metadata.title.unwrap_or_default());
//! println!("Duration: {}ms", metadata.duration_ms);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};

/// Extracted metadata from an audio file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    // Core metadata
    /// Track title (normalized, falls back to the file stem)
    pub title: Option<String>,
    /// Primary artist (normalized)
    pub artist: Option<String>,
    /// Album name (normalized)
    pub album: Option<String>,
    /// Album artist (for compilations, normalized)
    pub album_artist: Option<String>,
    /// Release year
    pub year: Option<i32>,
    /// Track number on album
    pub track_number: Option<u32>,
    /// Disc number for multi-disc albums
    pub disc_number: Option<u32>,
    /// Genre classification
    pub genre: Option<String>,

    // Audio properties
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Bitrate in kbps
    pub bitrate: Option<u32>,
    /// Sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Number of audio channels
    pub channels: Option<u8>,
    /// Lowercase file extension (e.g., "mp3", "flac")
    pub format: String,
    /// File size in bytes
    pub file_size: u64,
    /// MIME type of the container
    pub mime_type: String,

    /// Whether the file carried any tag at all
    pub has_tags: bool,
}

/// Anything that can turn an audio file into [`ExtractedMetadata`].
///
/// The library scanner depends on this rather than on [`MetadataExtractor`]
/// directly.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata>;
}

/// Audio metadata extractor
///
/// Extracts metadata from audio files using the `lofty` crate.
#[derive(Debug, Clone, Copy)]
pub struct MetadataExtractor {
    /// Parse options for lofty
    parse_options: ParseOptions,
}

impl MetadataExtractor {
    /// Create a new metadata extractor with default settings
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    /// Create extractor with custom parse options
    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    /// Extract metadata from an audio file
    ///
    /// Parsing is blocking and runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist (`FileNotFound`)
    /// - The container cannot be identified (`UnsupportedFormat`)
    /// - The container is identified but cannot be parsed (`ExtractionFailed`)
    pub async fn extract_from_file(&self, path: &Path) -> Result<ExtractedMetadata> {
        let extractor = *self;
        let owned: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || extractor.extract_blocking(&owned))
            .await
            .map_err(|e| MetadataError::ExtractionFailed(format!("extraction task failed: {e}")))?
    }

    /// Synchronous variant of [`MetadataExtractor::extract_from_file`].
    pub fn extract_blocking(&self, path: &Path) -> Result<ExtractedMetadata> {
        debug!("Extracting metadata from: {}", path.display());

        let file_size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MetadataError::FileNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let probe = Probe::open(path)
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to open file: {e}")))?
            .options(self.parse_options)
            .guess_file_type()?;

        if probe.file_type().is_none() {
            return Err(MetadataError::UnsupportedFormat(path.display().to_string()));
        }

        let tagged_file = probe
            .read()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {e}")))?;

        let file_type = tagged_file.file_type();
        let properties = tagged_file.properties();

        let mut metadata = ExtractedMetadata {
            duration_ms: properties.duration().as_millis() as u64,
            bitrate: properties.audio_bitrate(),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            format: format_from_path(path).unwrap_or_else(|| format!("{file_type:?}").to_lowercase()),
            file_size,
            mime_type: file_type_to_mime_type(file_type).to_string(),
            ..Default::default()
        };

        // Primary tag first, then whichever tag the file has
        match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => {
                metadata.has_tags = true;
                metadata.title = tag.title().and_then(|s| non_empty(&s));
                metadata.artist = tag.artist().and_then(|s| non_empty(&s));
                metadata.album = tag.album().and_then(|s| non_empty(&s));
                metadata.album_artist = tag.get_string(&ItemKey::AlbumArtist).and_then(non_empty);
                metadata.year = tag.year().and_then(|y| i32::try_from(y).ok());
                metadata.track_number = tag.track();
                metadata.disc_number = tag.disk();
                metadata.genre = tag.genre().and_then(|s| non_empty(&s));
            }
            None => {
                warn!("No tags found in file: {}", path.display());
            }
        }

        if metadata.title.is_none() {
            metadata.title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(non_empty);
        }

        Ok(metadata)
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataSource for MetadataExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata> {
        self.extract_from_file(path).await
    }
}

/// Normalize text metadata
///
/// - Trims leading/trailing whitespace
/// - Normalizes consecutive whitespace to single space
/// - Removes null bytes and control characters
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

fn non_empty(text: &str) -> Option<String> {
    let normalized = normalize_text(text);
    (!normalized.is_empty()).then_some(normalized)
}

/// Lowercase extension of `path`, if it has one.
pub fn format_from_path(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Convert lofty FileType to MIME type string
fn file_type_to_mime_type(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Aac => "audio/aac",
        FileType::Aiff => "audio/aiff",
        FileType::Ape => "audio/ape",
        FileType::Flac => "audio/flac",
        FileType::Mpeg => "audio/mpeg",
        FileType::Mp4 => "audio/mp4",
        FileType::Mpc => "audio/musepack",
        FileType::Opus => "audio/opus",
        FileType::Vorbis => "audio/vorbis",
        FileType::Speex => "audio/speex",
        FileType::Wav => "audio/wav",
        FileType::WavPack => "audio/wavpack",
        _ => "application/octet-stream",
    }
}

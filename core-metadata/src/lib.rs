//! # Metadata Module
//!
//! Extracts tags and audio properties from audio files.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag extraction (ID3, Vorbis comments, MP4, FLAC, RIFF INFO)
//! - Audio properties (duration, bitrate, sample rate, channels)
//! - Text normalization of tag values
//! - A [`MetadataSource`] seam so importers can swap in another reader

pub mod error;
pub mod extractor;

pub use error::{MetadataError, Result};
pub use extractor::{ExtractedMetadata, MetadataExtractor, MetadataSource};

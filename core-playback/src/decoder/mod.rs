//! # Audio Decoding
//!
//! [`SymphoniaDecoder`] implements [`AudioDecoder`](crate::AudioDecoder) for
//! every container and codec symphonia ships (MP3, FLAC, Ogg Vorbis, AAC/ALAC
//! in MP4, WAV/AIFF PCM).
//!
//! ```text
//! AudioSource → MediaSourceStream → FormatReader → Decoder → AudioFrameChunk
//! ```

mod format_detector;
mod sample_converter;
mod symphonia;

pub use self::symphonia::SymphoniaDecoder;
pub use format_detector::FormatDetector;
pub use sample_converter::SampleConverter;

//! Format hints and codec mapping around symphonia's probe.

use crate::error::{PlaybackError, Result};
use crate::traits::AudioCodec;
use std::path::Path;
use symphonia::core::codecs::{self, CodecType};
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

const PCM_CODECS: [CodecType; 14] = [
    codecs::CODEC_TYPE_PCM_S8,
    codecs::CODEC_TYPE_PCM_U8,
    codecs::CODEC_TYPE_PCM_S16LE,
    codecs::CODEC_TYPE_PCM_S16BE,
    codecs::CODEC_TYPE_PCM_S24LE,
    codecs::CODEC_TYPE_PCM_S24BE,
    codecs::CODEC_TYPE_PCM_S32LE,
    codecs::CODEC_TYPE_PCM_S32BE,
    codecs::CODEC_TYPE_PCM_F32LE,
    codecs::CODEC_TYPE_PCM_F32BE,
    codecs::CODEC_TYPE_PCM_F64LE,
    codecs::CODEC_TYPE_PCM_F64BE,
    codecs::CODEC_TYPE_PCM_ALAW,
    codecs::CODEC_TYPE_PCM_MULAW,
];

/// Probe hints and codec lookups.
pub struct FormatDetector;

impl FormatDetector {
    /// Probe hint carrying the extension of `path`, if any.
    pub fn hint_from_path(path: &Path) -> Hint {
        let mut hint = Hint::new();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(extension) => {
                debug!("Setting probe hint extension: {}", extension);
                hint.with_extension(extension);
            }
            None => debug!("No file extension found, probe will auto-detect"),
        }
        hint
    }

    /// Probe hint from a MIME type such as `audio/flac`.
    pub fn hint_from_mime_type(mime_type: &str) -> Hint {
        let mut hint = Hint::new();
        hint.mime_type(mime_type);
        hint
    }

    /// Probe hint for in-memory data with an optional codec guess.
    pub fn hint_from_codec(codec: Option<&AudioCodec>) -> Hint {
        let mut hint = Hint::new();
        if let Some(codec) = codec {
            hint.with_extension(Self::codec_extension(codec));
            hint.mime_type(Self::codec_mime_type(codec));
        }
        hint
    }

    /// Map symphonia's codec identifier onto [`AudioCodec`].
    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        match codec_type {
            codecs::CODEC_TYPE_MP3 => AudioCodec::Mp3,
            codecs::CODEC_TYPE_AAC => AudioCodec::Aac,
            codecs::CODEC_TYPE_FLAC => AudioCodec::Flac,
            codecs::CODEC_TYPE_VORBIS => AudioCodec::Vorbis,
            codecs::CODEC_TYPE_OPUS => AudioCodec::Opus,
            codecs::CODEC_TYPE_ALAC => AudioCodec::Alac,
            pcm if PCM_CODECS.contains(&pcm) => AudioCodec::Wav,
            other => {
                warn!("Unknown codec type: {:?}", other);
                AudioCodec::Unknown
            }
        }
    }

    /// Fails for codecs the bundled decoders cannot handle.
    ///
    /// Opus is demuxed from Ogg but symphonia 0.5 has no Opus decoder.
    pub fn validate_codec_support(codec: &AudioCodec) -> Result<()> {
        match codec {
            AudioCodec::Mp3
            | AudioCodec::Aac
            | AudioCodec::Flac
            | AudioCodec::Vorbis
            | AudioCodec::Wav
            | AudioCodec::Alac => Ok(()),
            AudioCodec::Opus => Err(PlaybackError::UnsupportedCodec(
                "Opus decoding is not available".to_string(),
            )),
            AudioCodec::Unknown => Err(PlaybackError::UnsupportedCodec(
                "Unknown audio codec".to_string(),
            )),
            AudioCodec::Other(name) => Err(PlaybackError::UnsupportedCodec(name.clone())),
        }
    }

    /// Common file extension for a codec.
    pub fn codec_extension(codec: &AudioCodec) -> &'static str {
        match codec {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac | AudioCodec::Alac => "m4a",
            AudioCodec::Flac => "flac",
            AudioCodec::Vorbis => "ogg",
            AudioCodec::Opus => "opus",
            AudioCodec::Wav => "wav",
            AudioCodec::Unknown | AudioCodec::Other(_) => "bin",
        }
    }

    /// MIME type for a codec.
    pub fn codec_mime_type(codec: &AudioCodec) -> &'static str {
        match codec {
            AudioCodec::Mp3 => "audio/mpeg",
            AudioCodec::Aac | AudioCodec::Alac => "audio/mp4",
            AudioCodec::Flac => "audio/flac",
            AudioCodec::Vorbis => "audio/ogg",
            AudioCodec::Opus => "audio/opus",
            AudioCodec::Wav => "audio/wav",
            AudioCodec::Unknown | AudioCodec::Other(_) => "application/octet-stream",
        }
    }
}

//! [`AudioDecoder`] backed by symphonia.

use crate::decoder::format_detector::FormatDetector;
use crate::decoder::sample_converter::SampleConverter;
use crate::error::{PlaybackError, Result};
use crate::traits::{AudioDecoder, AudioFormat, AudioFrameChunk, AudioSource, ProbeResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, ErrorKind};
use std::time::Duration;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tracing::{debug, error, info, instrument, warn};

/// Consecutive bad packets tolerated before decoding gives up.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Symphonia decode pipeline for one source.
///
/// Decoded audio beyond what a `decode_frames` call asked for is buffered, so
/// callers can pull fixed-size chunks regardless of the codec's packet size.
pub struct SymphoniaDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: AudioFormat,
    duration: Option<Duration>,
    tags: HashMap<String, String>,
    /// Frames handed out so far (position of the next chunk)
    position_frames: u64,
    /// Interleaved samples decoded but not yet returned
    pending: Vec<f32>,
    eof: bool,
    source_info: String,
}

impl SymphoniaDecoder {
    /// Open and probe `source` on the blocking pool.
    ///
    /// # Errors
    ///
    /// `SourceError` when the file cannot be opened, `InvalidFormat` when no
    /// container is recognized, `FormatNotDecodable`/`UnsupportedCodec` when
    /// no track can be decoded.
    #[instrument(skip(source), fields(cached = source.is_cached()))]
    pub async fn new(source: AudioSource) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::open(source))
            .await
            .map_err(|e| PlaybackError::Internal(format!("decoder task failed: {e}")))?
    }

    /// Synchronous variant of [`SymphoniaDecoder::new`].
    pub fn open(source: AudioSource) -> Result<Self> {
        let (media_source, hint, source_info) = open_media_source(source)?;

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                media_source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                error!("Format probe failed for {}: {}", source_info, e);
                PlaybackError::InvalidFormat(format!("Failed to probe format: {e}"))
            })?;

        let mut tags = HashMap::new();
        {
            let container = probed.format.metadata();
            if let Some(revision) = container.current() {
                collect_tags(revision, &mut tags);
            }
        }
        if let Some(side_data) = probed.metadata.get() {
            if let Some(revision) = side_data.current() {
                collect_tags(revision, &mut tags);
            }
        }

        let format_reader = probed.format;
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                PlaybackError::FormatNotDecodable("No supported audio tracks".to_string())
            })?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let codec = FormatDetector::detect_codec(params.codec);
        FormatDetector::validate_codec_support(&codec)?;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| PlaybackError::InvalidFormat("Missing sample rate".to_string()))?;

        // Some containers (MP4) only reveal the layout after the first packet.
        let channels = params.channels.map(|ch| ch.count() as u16).unwrap_or(2);
        let bits_per_sample = params.bits_per_sample.map(|b| b as u16);
        let duration = params
            .n_frames
            .map(|frames| frames_to_duration(frames, sample_rate));

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                PlaybackError::DecoderError(format!("Failed to create codec decoder: {e}"))
            })?;

        info!(
            "Opened {}: {:?} {}Hz {}ch, duration {:?}",
            source_info, codec, sample_rate, channels, duration
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            format: AudioFormat::new(codec, sample_rate, channels, bits_per_sample, None),
            duration,
            tags,
            position_frames: 0,
            pending: Vec::new(),
            eof: false,
            source_info,
        })
    }

    /// Position of the next chunk `decode_frames` will return.
    pub fn position(&self) -> Duration {
        frames_to_duration(self.position_frames, self.format.sample_rate)
    }

    /// Read and decode the next packet of the selected track.
    ///
    /// Corrupt packets are skipped until `MAX_CONSECUTIVE_ERRORS` in a row.
    fn decode_next_packet(&mut self) -> Result<Option<Vec<f32>>> {
        if self.eof {
            return Ok(None);
        }

        let mut consecutive_errors = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    debug!("Reached end of {}", self.source_info);
                    self.eof = true;
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(PlaybackError::DecoderError(
                        "Track list changed, reset required".to_string(),
                    ));
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "I/O error reading packet ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::SourceError(format!(
                            "Stream I/O failure: {e}"
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to read packet: {e}"
                    )));
                }
            };

            // Drop metadata revisions that arrive mid-stream.
            while !self.format_reader.metadata().is_latest() {
                self.format_reader.metadata().pop();
            }

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let decoded_channels = decoded.spec().channels.count() as u16;
                    if decoded_channels != self.format.channels {
                        debug!(
                            "Channel count corrected from {} to {}",
                            self.format.channels, decoded_channels
                        );
                        self.format.channels = decoded_channels;
                    }
                    return Ok(Some(SampleConverter::to_interleaved_f32(decoded)));
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupted packet ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::CorruptedStream(format!(
                            "{MAX_CONSECUTIVE_ERRORS} consecutive unreadable packets"
                        )));
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping undecodable packet ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::DecoderError(format!(
                            "Decoder failure: {e}"
                        )));
                    }
                }
                Err(e) => {
                    return Err(PlaybackError::DecoderError(format!(
                        "Failed to decode packet: {e}"
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl AudioDecoder for SymphoniaDecoder {
    async fn probe(&mut self) -> Result<ProbeResult> {
        Ok(ProbeResult::new(self.format.clone())
            .with_duration(self.duration)
            .with_tags(self.tags.clone()))
    }

    async fn decode_frames(&mut self, max_frames: usize) -> Result<Option<AudioFrameChunk>> {
        let max_frames = max_frames.max(1);

        while self.pending.len() < max_frames * usize::from(self.format.channels.max(1)) {
            match self.decode_next_packet()? {
                Some(samples) => self.pending.extend(samples),
                None => break,
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let channels = usize::from(self.format.channels.max(1));
        let take = (max_frames * channels).min(self.pending.len());
        let samples: Vec<f32> = self.pending.drain(..take).collect();
        let frames = samples.len() / channels;

        let timestamp = self.position();
        self.position_frames += frames as u64;

        Ok(Some(AudioFrameChunk::new(samples, frames, timestamp)))
    }

    async fn seek(&mut self, position: Duration) -> Result<()> {
        if let Some(duration) = self.duration {
            if position > duration {
                return Err(PlaybackError::SeekOutOfBounds(position));
            }
        }

        self.format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(position.as_secs_f64()),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| {
                warn!("Seek failed in {}: {}", self.source_info, e);
                PlaybackError::SeekNotSupported
            })?;

        self.decoder.reset();
        self.pending.clear();
        self.position_frames =
            (position.as_secs_f64() * f64::from(self.format.sample_rate)) as u64;
        self.eof = false;

        debug!("Seeked to {:?}", position);
        Ok(())
    }
}

fn open_media_source(source: AudioSource) -> Result<(MediaSourceStream, Hint, String)> {
    match source {
        AudioSource::LocalFile { path } => {
            let file = std::fs::File::open(&path).map_err(|e| {
                PlaybackError::SourceError(format!("{}: {e}", path.display()))
            })?;
            let hint = FormatDetector::hint_from_path(&path);
            let stream = MediaSourceStream::new(Box::new(file) as Box<dyn MediaSource>, Default::default());
            Ok((stream, hint, path.display().to_string()))
        }
        AudioSource::CachedChunk { data, codec_hint } => {
            let hint = FormatDetector::hint_from_codec(codec_hint.as_ref());
            let description = format!("memory buffer ({} bytes)", data.len());
            let stream = MediaSourceStream::new(
                Box::new(Cursor::new(data)) as Box<dyn MediaSource>,
                Default::default(),
            );
            Ok((stream, hint, description))
        }
    }
}

/// Copy tags into `tags`, keyed by a stable lowercase name. Earlier
/// revisions win.
fn collect_tags(revision: &MetadataRevision, tags: &mut HashMap<String, String>) {
    for tag in revision.tags() {
        let key = match tag.std_key {
            Some(StandardTagKey::TrackTitle) => "title".to_string(),
            Some(StandardTagKey::Artist) => "artist".to_string(),
            Some(StandardTagKey::Album) => "album".to_string(),
            Some(StandardTagKey::AlbumArtist) => "album_artist".to_string(),
            Some(StandardTagKey::Genre) => "genre".to_string(),
            Some(StandardTagKey::TrackNumber) => "track_number".to_string(),
            Some(StandardTagKey::DiscNumber) => "disc_number".to_string(),
            Some(StandardTagKey::Date) => "date".to_string(),
            _ => tag.key.to_ascii_lowercase(),
        };
        tags.entry(key).or_insert_with(|| tag.value.to_string());
    }
}

fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / f64::from(sample_rate))
}

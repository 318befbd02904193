//! [`PlaybackAdapter`] that tracks transport state without producing sound.
//!
//! Useful for headless hosts and tests: the player behaves exactly as with a
//! real output, positions only move on `seek`.

use crate::error::{PlaybackError, Result};
use crate::traits::{AudioFormat, AudioSource, PlaybackAdapter};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct SilentState {
    source: Option<AudioSource>,
    format: Option<AudioFormat>,
    playing: bool,
    position: Duration,
    volume: f32,
}

impl Default for SilentState {
    fn default() -> Self {
        Self {
            source: None,
            format: None,
            playing: false,
            position: Duration::ZERO,
            volume: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SilentAdapter {
    state: Mutex<SilentState>,
}

impl SilentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source handed to the last `play`, cleared by `stop`.
    pub fn current_source(&self) -> Option<AudioSource> {
        self.lock().source.clone()
    }

    pub fn current_format(&self) -> Option<AudioFormat> {
        self.lock().format.clone()
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn lock(&self) -> MutexGuard<'_, SilentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PlaybackAdapter for SilentAdapter {
    async fn play(&self, source: AudioSource, format: AudioFormat) -> Result<()> {
        let mut state = self.lock();
        state.source = Some(source);
        state.format = Some(format);
        state.playing = true;
        state.position = Duration::ZERO;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.lock();
        if state.source.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        state.playing = false;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let mut state = self.lock();
        if state.source.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        state.playing = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.lock();
        state.source = None;
        state.format = None;
        state.playing = false;
        state.position = Duration::ZERO;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        let mut state = self.lock();
        if state.source.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        state.position = position;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        self.lock().volume = volume;
        Ok(())
    }

    async fn get_position(&self) -> Result<Duration> {
        Ok(self.lock().position)
    }

    async fn is_playing(&self) -> Result<bool> {
        Ok(self.lock().playing)
    }
}

//! Ordered play queue with a cursor and repeat modes.

use crate::error::{PlaybackError, Result};
use crate::traits::{AudioCodec, AudioFormat, AudioSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// What happens when the queue runs past its last (or current) entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last entry.
    #[default]
    Off,
    /// Replay the current entry when it finishes.
    One,
    /// Wrap from the last entry back to the first.
    All,
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        };
        f.write_str(name)
    }
}

/// A playable entry: enough of a library track to drive an adapter and
/// describe it in events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub track_id: String,
    pub title: String,
    pub path: PathBuf,
    pub duration_ms: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl QueueItem {
    pub fn new(track_id: impl Into<String>, title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            track_id: track_id.into(),
            title: title.into(),
            path: path.into(),
            duration_ms: None,
            sample_rate: None,
            channels: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_signal(mut self, sample_rate: Option<u32>, channels: Option<u16>) -> Self {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    pub fn source(&self) -> AudioSource {
        AudioSource::LocalFile {
            path: self.path.clone(),
        }
    }

    /// Format announced to the adapter. Unknown signal parameters default to
    /// CD quality; the codec comes from the file extension.
    pub fn audio_format(&self) -> AudioFormat {
        let defaults = AudioFormat::cd_quality();
        AudioFormat::new(
            AudioCodec::from_path(&self.path),
            self.sample_rate.unwrap_or(defaults.sample_rate),
            self.channels.unwrap_or(defaults.channels),
            None,
            None,
        )
    }
}

/// Entries plus the index of the current one.
///
/// The cursor is `None` only while the queue is empty.
#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    items: Vec<QueueItem>,
    cursor: Option<usize>,
    repeat: RepeatMode,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents and point the cursor at `start` (clamped).
    pub fn replace(&mut self, items: Vec<QueueItem>, start: usize) {
        self.cursor = if items.is_empty() {
            None
        } else {
            Some(start.min(items.len() - 1))
        };
        self.items = items;
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.cursor.and_then(|index| self.items.get(index))
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    /// Append to the end; an empty queue gains a cursor.
    pub fn push(&mut self, item: QueueItem) {
        self.items.push(item);
        if self.cursor.is_none() {
            self.cursor = Some(0);
        }
    }

    /// Move the cursor to `index`.
    pub fn jump(&mut self, index: usize) -> Result<&QueueItem> {
        if index >= self.items.len() {
            return Err(PlaybackError::QueueIndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.cursor = Some(index);
        Ok(&self.items[index])
    }

    /// User-requested skip forward.
    ///
    /// Wraps only under [`RepeatMode::All`]; at the end otherwise the cursor
    /// stays put and `None` is returned.
    pub fn next(&mut self) -> Option<&QueueItem> {
        let index = self.cursor?;
        let next = if index + 1 < self.items.len() {
            index + 1
        } else if self.repeat == RepeatMode::All {
            0
        } else {
            return None;
        };
        self.cursor = Some(next);
        self.items.get(next)
    }

    /// User-requested skip back; wraps to the last entry under
    /// [`RepeatMode::All`].
    pub fn previous(&mut self) -> Option<&QueueItem> {
        let index = self.cursor?;
        let previous = if index > 0 {
            index - 1
        } else if self.repeat == RepeatMode::All {
            self.items.len() - 1
        } else {
            return None;
        };
        self.cursor = Some(previous);
        self.items.get(previous)
    }

    /// Entry to play after the current one finished on its own.
    ///
    /// Same as [`PlayQueue::next`] except [`RepeatMode::One`] replays the
    /// current entry.
    pub fn advance(&mut self) -> Option<&QueueItem> {
        if self.repeat == RepeatMode::One {
            return self.current();
        }
        self.next()
    }
}

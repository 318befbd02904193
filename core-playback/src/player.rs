//! Player state machine over a host [`PlaybackAdapter`].
//!
//! ```text
//! Stopped ──play──▶ Playing ◀──resume── Paused
//!    ▲                 │ └────pause────▶   │
//!    └──────stop───────┴───────stop────────┘
//! ```
//!
//! Every transition is published as a [`PlaybackEvent`].

use crate::error::{PlaybackError, Result};
use crate::queue::{PlayQueue, QueueItem, RepeatMode};
use crate::traits::PlaybackAdapter;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// `previous` restarts the current track instead once playback is past this.
pub const PREVIOUS_RESTART_THRESHOLD: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Playing or paused.
    pub fn is_active(self) -> bool {
        self != PlaybackState::Stopped
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Snapshot returned by [`Player::now_playing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub item: QueueItem,
    pub index: usize,
    pub queue_length: usize,
    pub state: PlaybackState,
    pub position: Duration,
    pub volume: f32,
    pub repeat: RepeatMode,
}

struct PlayerInner {
    state: PlaybackState,
    queue: PlayQueue,
    volume: f32,
}

/// Queue-driven player.
///
/// All operations serialize on one lock that is held while the adapter is
/// called, so adapter implementations must not call back into the player.
pub struct Player {
    adapter: Arc<dyn PlaybackAdapter>,
    event_bus: EventBus,
    inner: Mutex<PlayerInner>,
}

impl Player {
    pub fn new(adapter: Arc<dyn PlaybackAdapter>, event_bus: EventBus) -> Self {
        Self {
            adapter,
            event_bus,
            inner: Mutex::new(PlayerInner {
                state: PlaybackState::Stopped,
                queue: PlayQueue::new(),
                volume: 1.0,
            }),
        }
    }

    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.state
    }

    pub async fn volume(&self) -> f32 {
        self.inner.lock().await.volume
    }

    pub async fn queue(&self) -> Vec<QueueItem> {
        self.inner.lock().await.queue.items().to_vec()
    }

    pub async fn repeat_mode(&self) -> RepeatMode {
        self.inner.lock().await.queue.repeat()
    }

    pub async fn set_repeat_mode(&self, repeat: RepeatMode) {
        self.inner.lock().await.queue.set_repeat(repeat);
        debug!("Repeat mode set to {}", repeat);
    }

    /// Replace the queue, stopping whatever is playing. Does not start
    /// playback.
    #[instrument(skip(self, items), fields(len = items.len()))]
    pub async fn load_queue(&self, items: Vec<QueueItem>, start: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state.is_active() {
            self.stop_locked(&mut inner).await?;
        }

        inner.queue.replace(items, start);
        let length = inner.queue.len();
        self.emit(PlaybackEvent::QueueChanged { length });
        Ok(())
    }

    /// Append one entry to the queue.
    pub async fn enqueue(&self, item: QueueItem) {
        let mut inner = self.inner.lock().await;
        inner.queue.push(item);
        let length = inner.queue.len();
        self.emit(PlaybackEvent::QueueChanged { length });
    }

    /// Start the current entry from the beginning, from any state.
    ///
    /// # Errors
    ///
    /// `EmptyQueue` when nothing is queued; adapter failures are published as
    /// `PlaybackEvent::Error` and leave the player stopped.
    pub async fn play(&self) -> Result<QueueItem> {
        let mut inner = self.inner.lock().await;
        self.start_current(&mut inner).await
    }

    /// Move the cursor to `index` and start that entry.
    pub async fn play_at(&self, index: usize) -> Result<QueueItem> {
        let mut inner = self.inner.lock().await;
        inner.queue.jump(index)?;
        self.start_current(&mut inner).await
    }

    /// Playing → Paused.
    pub async fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.pause_locked(&mut inner).await
    }

    /// Paused → Playing.
    pub async fn resume(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.resume_locked(&mut inner).await
    }

    /// Pause when playing, resume when paused, play when stopped. Returns the
    /// new state.
    pub async fn toggle(&self) -> Result<PlaybackState> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            PlaybackState::Playing => self.pause_locked(&mut inner).await?,
            PlaybackState::Paused => self.resume_locked(&mut inner).await?,
            PlaybackState::Stopped => {
                self.start_current(&mut inner).await?;
            }
        }
        Ok(inner.state)
    }

    /// Playing/Paused → Stopped.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_active() {
            return Err(PlaybackError::invalid_state("stop", inner.state));
        }
        self.stop_locked(&mut inner).await
    }

    /// Skip forward and start the new entry.
    ///
    /// Returns `None` when the queue is exhausted; playback then stops.
    pub async fn next(&self) -> Result<Option<QueueItem>> {
        let mut inner = self.inner.lock().await;
        if inner.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        if inner.queue.next().is_some() {
            return self.start_current(&mut inner).await.map(Some);
        }

        debug!("End of queue reached");
        if inner.state.is_active() {
            self.stop_locked(&mut inner).await?;
        }
        Ok(None)
    }

    /// Skip back and start the new entry.
    ///
    /// Past [`PREVIOUS_RESTART_THRESHOLD`], or on the first entry without
    /// repeat, the current entry restarts instead.
    pub async fn previous(&self) -> Result<QueueItem> {
        let mut inner = self.inner.lock().await;
        if inner.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        let restart =
            inner.state.is_active() && self.position().await > PREVIOUS_RESTART_THRESHOLD;
        if !restart {
            inner.queue.previous();
        }
        self.start_current(&mut inner).await
    }

    /// Seek within the current entry.
    ///
    /// # Errors
    ///
    /// `InvalidState` while stopped; `SeekOutOfBounds` past the known
    /// duration.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        let inner = self.inner.lock().await;
        if !inner.state.is_active() {
            return Err(PlaybackError::invalid_state("seek", inner.state));
        }
        let item = inner.queue.current().ok_or(PlaybackError::NoTrackLoaded)?;

        if let Some(duration) = item.duration() {
            if position > duration {
                return Err(PlaybackError::SeekOutOfBounds(position));
            }
        }

        self.adapter.seek(position).await?;
        self.emit(PlaybackEvent::Seeked {
            track_id: item.track_id.clone(),
            position_ms: duration_ms(position),
        });
        Ok(())
    }

    /// Set the volume, clamped to `[0.0, 1.0]`. Returns the applied value.
    pub async fn set_volume(&self, volume: f32) -> Result<f32> {
        if volume.is_nan() {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        let volume = volume.clamp(0.0, 1.0);

        let mut inner = self.inner.lock().await;
        self.adapter.set_volume(volume).await?;
        inner.volume = volume;
        self.emit(PlaybackEvent::VolumeChanged { volume });
        Ok(volume)
    }

    /// Called by the host when the adapter reaches the end of the current
    /// entry. Publishes `Completed` and continues according to the repeat
    /// mode; returns the entry that started, if any.
    pub async fn track_finished(&self) -> Result<Option<QueueItem>> {
        let mut inner = self.inner.lock().await;
        if inner.state != PlaybackState::Playing {
            return Err(PlaybackError::invalid_state("finish", inner.state));
        }

        let finished = inner
            .queue
            .current()
            .map(|item| item.track_id.clone())
            .ok_or(PlaybackError::NoTrackLoaded)?;
        self.emit(PlaybackEvent::Completed {
            track_id: finished.clone(),
        });

        if inner.queue.advance().is_some() {
            return self.start_current(&mut inner).await.map(Some);
        }

        inner.state = PlaybackState::Stopped;
        self.emit(PlaybackEvent::Stopped {
            track_id: Some(finished),
        });
        Ok(None)
    }

    /// Current entry with state and position, or `None` for an empty queue.
    pub async fn now_playing(&self) -> Option<NowPlaying> {
        let inner = self.inner.lock().await;
        let item = inner.queue.current()?.clone();
        let position = if inner.state.is_active() {
            self.position().await
        } else {
            Duration::ZERO
        };

        Some(NowPlaying {
            item,
            index: inner.queue.cursor().unwrap_or_default(),
            queue_length: inner.queue.len(),
            state: inner.state,
            position,
            volume: inner.volume,
            repeat: inner.queue.repeat(),
        })
    }

    async fn start_current(&self, inner: &mut PlayerInner) -> Result<QueueItem> {
        let item = match inner.queue.current() {
            Some(item) => item.clone(),
            None => return Err(PlaybackError::EmptyQueue),
        };

        if let Err(e) = self.adapter.play(item.source(), item.audio_format()).await {
            warn!("Adapter failed to play {}: {}", item.track_id, e);
            inner.state = PlaybackState::Stopped;
            self.emit(PlaybackEvent::Error {
                track_id: Some(item.track_id.clone()),
                message: e.to_string(),
            });
            return Err(e);
        }

        inner.state = PlaybackState::Playing;
        info!("Playing {} ({})", item.title, item.track_id);
        self.emit(PlaybackEvent::Started {
            track_id: item.track_id.clone(),
            title: item.title.clone(),
            duration_ms: item.duration_ms,
        });
        Ok(item)
    }

    async fn pause_locked(&self, inner: &mut PlayerInner) -> Result<()> {
        if inner.state != PlaybackState::Playing {
            return Err(PlaybackError::invalid_state("pause", inner.state));
        }

        self.adapter.pause().await?;
        inner.state = PlaybackState::Paused;
        let position_ms = duration_ms(self.position().await);
        if let Some(item) = inner.queue.current() {
            self.emit(PlaybackEvent::Paused {
                track_id: item.track_id.clone(),
                position_ms,
            });
        }
        Ok(())
    }

    async fn resume_locked(&self, inner: &mut PlayerInner) -> Result<()> {
        if inner.state != PlaybackState::Paused {
            return Err(PlaybackError::invalid_state("resume", inner.state));
        }

        self.adapter.resume().await?;
        inner.state = PlaybackState::Playing;
        let position_ms = duration_ms(self.position().await);
        if let Some(item) = inner.queue.current() {
            self.emit(PlaybackEvent::Resumed {
                track_id: item.track_id.clone(),
                position_ms,
            });
        }
        Ok(())
    }

    async fn stop_locked(&self, inner: &mut PlayerInner) -> Result<()> {
        self.adapter.stop().await?;
        inner.state = PlaybackState::Stopped;
        self.emit(PlaybackEvent::Stopped {
            track_id: inner.queue.current().map(|item| item.track_id.clone()),
        });
        Ok(())
    }

    async fn position(&self) -> Duration {
        self.adapter.get_position().await.unwrap_or_else(|e| {
            warn!("Adapter position unavailable: {}", e);
            Duration::ZERO
        })
    }

    fn emit(&self, event: PlaybackEvent) {
        self.event_bus.emit(CoreEvent::Playback(event)).ok();
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{AudioFormat, AudioSource};
    use async_trait::async_trait;
    use core_runtime::events::EventStream;
    use mockall::mock;

    mock! {
        pub Adapter {}

        #[async_trait]
        impl PlaybackAdapter for Adapter {
            async fn play(&self, source: AudioSource, format: AudioFormat) -> Result<()>;
            async fn pause(&self) -> Result<()>;
            async fn resume(&self) -> Result<()>;
            async fn stop(&self) -> Result<()>;
            async fn seek(&self, position: Duration) -> Result<()>;
            async fn set_volume(&self, volume: f32) -> Result<()>;
            async fn get_position(&self) -> Result<Duration>;
            async fn is_playing(&self) -> Result<bool>;
        }
    }

    /// Adapter that accepts everything and reports `position`.
    fn accepting_adapter(position: Duration) -> MockAdapter {
        let mut adapter = MockAdapter::new();
        adapter.expect_play().returning(|_, _| Ok(()));
        adapter.expect_pause().returning(|| Ok(()));
        adapter.expect_resume().returning(|| Ok(()));
        adapter.expect_stop().returning(|| Ok(()));
        adapter.expect_seek().returning(|_| Ok(()));
        adapter.expect_set_volume().returning(|_| Ok(()));
        adapter.expect_get_position().returning(move || Ok(position));
        adapter.expect_is_playing().returning(|| Ok(true));
        adapter
    }

    fn items(count: usize) -> Vec<QueueItem> {
        (0..count)
            .map(|i| {
                QueueItem::new(format!("t{i}"), format!("Track {i}"), format!("/music/{i}.flac"))
                    .with_duration_ms(180_000)
            })
            .collect()
    }

    fn player_with(adapter: MockAdapter) -> (Player, EventStream) {
        let bus = EventBus::new(64);
        let events = bus
            .stream()
            .filter(|event| matches!(event, CoreEvent::Playback(_)));
        (Player::new(Arc::new(adapter), bus), events)
    }

    fn playback_events(stream: &mut EventStream) -> Vec<PlaybackEvent> {
        stream
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                CoreEvent::Playback(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_play_starts_current_item() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_play()
            .withf(|source, format| {
                source.path() == Some(std::path::Path::new("/music/1.flac"))
                    && format.codec == crate::AudioCodec::Flac
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let (player, mut events) = player_with(adapter);
        player.load_queue(items(3), 1).await.unwrap();
        let started = player.play().await.unwrap();

        assert_eq!(started.track_id, "t1");
        assert_eq!(player.state().await, PlaybackState::Playing);
        assert_eq!(
            playback_events(&mut events),
            vec![
                PlaybackEvent::QueueChanged { length: 3 },
                PlaybackEvent::Started {
                    track_id: "t1".to_string(),
                    title: "Track 1".to_string(),
                    duration_ms: Some(180_000),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_play_with_empty_queue() {
        let (player, _events) = player_with(MockAdapter::new());
        assert!(matches!(player.play().await, Err(PlaybackError::EmptyQueue)));
        assert!(matches!(player.next().await, Err(PlaybackError::EmptyQueue)));
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let (player, _events) = player_with(accepting_adapter(Duration::ZERO));
        player.load_queue(items(1), 0).await.unwrap();

        assert!(matches!(
            player.pause().await,
            Err(PlaybackError::InvalidState { operation: "pause", state: PlaybackState::Stopped })
        ));
        assert!(matches!(
            player.resume().await,
            Err(PlaybackError::InvalidState { operation: "resume", .. })
        ));
        assert!(matches!(
            player.stop().await,
            Err(PlaybackError::InvalidState { operation: "stop", .. })
        ));
        assert!(matches!(
            player.seek(Duration::from_secs(1)).await,
            Err(PlaybackError::InvalidState { operation: "seek", .. })
        ));

        player.play().await.unwrap();
        assert!(matches!(
            player.resume().await,
            Err(PlaybackError::InvalidState { state: PlaybackState::Playing, .. })
        ));
    }

    #[tokio::test]
    async fn test_pause_resume_report_position() {
        let (player, mut events) = player_with(accepting_adapter(Duration::from_millis(42_500)));
        player.load_queue(items(1), 0).await.unwrap();
        player.play().await.unwrap();
        player.pause().await.unwrap();
        player.resume().await.unwrap();

        let events = playback_events(&mut events);
        assert!(events.contains(&PlaybackEvent::Paused {
            track_id: "t0".to_string(),
            position_ms: 42_500,
        }));
        assert_eq!(
            events.last(),
            Some(&PlaybackEvent::Resumed {
                track_id: "t0".to_string(),
                position_ms: 42_500,
            })
        );
    }

    #[tokio::test]
    async fn test_toggle_cycle() {
        let (player, _events) = player_with(accepting_adapter(Duration::ZERO));
        player.load_queue(items(2), 0).await.unwrap();

        assert_eq!(player.toggle().await.unwrap(), PlaybackState::Playing);
        assert_eq!(player.toggle().await.unwrap(), PlaybackState::Paused);
        assert_eq!(player.toggle().await.unwrap(), PlaybackState::Playing);

        player.stop().await.unwrap();
        assert_eq!(player.state().await, PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn test_next_at_end_stops() {
        let (player, mut events) = player_with(accepting_adapter(Duration::ZERO));
        player.load_queue(items(2), 0).await.unwrap();
        player.play().await.unwrap();

        let next = player.next().await.unwrap();
        assert_eq!(next.map(|item| item.track_id), Some("t1".to_string()));

        assert!(player.next().await.unwrap().is_none());
        assert_eq!(player.state().await, PlaybackState::Stopped);
        assert_eq!(
            playback_events(&mut events).last(),
            Some(&PlaybackEvent::Stopped {
                track_id: Some("t1".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_next_wraps_with_repeat_all() {
        let (player, _events) = player_with(accepting_adapter(Duration::ZERO));
        player.load_queue(items(2), 1).await.unwrap();
        player.set_repeat_mode(RepeatMode::All).await;
        player.play().await.unwrap();

        let next = player.next().await.unwrap().unwrap();
        assert_eq!(next.track_id, "t0");
        assert_eq!(player.state().await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_previous_restarts_after_threshold() {
        let (player, _events) = player_with(accepting_adapter(Duration::from_secs(10)));
        player.load_queue(items(3), 2).await.unwrap();
        player.play().await.unwrap();

        assert_eq!(player.previous().await.unwrap().track_id, "t2");
    }

    #[tokio::test]
    async fn test_previous_moves_back_early_in_track() {
        let (player, _events) = player_with(accepting_adapter(Duration::from_secs(1)));
        player.load_queue(items(3), 2).await.unwrap();
        player.play().await.unwrap();

        assert_eq!(player.previous().await.unwrap().track_id, "t1");
    }

    #[tokio::test]
    async fn test_seek_bounds() {
        let (player, mut events) = player_with(accepting_adapter(Duration::ZERO));
        player.load_queue(items(1), 0).await.unwrap();
        player.play().await.unwrap();

        assert!(matches!(
            player.seek(Duration::from_secs(600)).await,
            Err(PlaybackError::SeekOutOfBounds(_))
        ));
        player.seek(Duration::from_secs(90)).await.unwrap();
        assert_eq!(
            playback_events(&mut events).last(),
            Some(&PlaybackEvent::Seeked {
                track_id: "t0".to_string(),
                position_ms: 90_000,
            })
        );
    }

    #[tokio::test]
    async fn test_set_volume_clamps() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_set_volume()
            .withf(|volume| (0.0..=1.0).contains(volume))
            .times(2)
            .returning(|_| Ok(()));

        let (player, mut events) = player_with(adapter);
        assert_eq!(player.set_volume(1.5).await.unwrap(), 1.0);
        assert_eq!(player.set_volume(-0.2).await.unwrap(), 0.0);
        assert!(matches!(
            player.set_volume(f32::NAN).await,
            Err(PlaybackError::InvalidVolume(_))
        ));
        assert_eq!(player.volume().await, 0.0);
        assert_eq!(
            playback_events(&mut events),
            vec![
                PlaybackEvent::VolumeChanged { volume: 1.0 },
                PlaybackEvent::VolumeChanged { volume: 0.0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_adapter_failure_publishes_error() {
        let mut adapter = MockAdapter::new();
        adapter
            .expect_play()
            .returning(|_, _| Err(PlaybackError::AudioDeviceError("no output".to_string())));

        let (player, mut events) = player_with(adapter);
        player.load_queue(items(1), 0).await.unwrap();
        assert!(player.play().await.is_err());
        assert_eq!(player.state().await, PlaybackState::Stopped);
        assert!(matches!(
            playback_events(&mut events).last(),
            Some(PlaybackEvent::Error { track_id: Some(id), .. }) if id == "t0"
        ));
    }

    #[tokio::test]
    async fn test_track_finished_follows_repeat_mode() {
        let (player, mut events) = player_with(accepting_adapter(Duration::ZERO));
        player.load_queue(items(2), 1).await.unwrap();
        player.set_repeat_mode(RepeatMode::One).await;
        player.play().await.unwrap();

        let replayed = player.track_finished().await.unwrap().unwrap();
        assert_eq!(replayed.track_id, "t1");

        player.set_repeat_mode(RepeatMode::Off).await;
        playback_events(&mut events);
        assert!(player.track_finished().await.unwrap().is_none());
        assert_eq!(player.state().await, PlaybackState::Stopped);
        assert_eq!(
            playback_events(&mut events),
            vec![
                PlaybackEvent::Completed {
                    track_id: "t1".to_string()
                },
                PlaybackEvent::Stopped {
                    track_id: Some("t1".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_now_playing_snapshot() {
        let (player, _events) = player_with(accepting_adapter(Duration::from_secs(5)));
        assert!(player.now_playing().await.is_none());

        player.load_queue(items(3), 1).await.unwrap();
        let idle = player.now_playing().await.unwrap();
        assert_eq!(idle.state, PlaybackState::Stopped);
        assert_eq!(idle.position, Duration::ZERO);

        player.play().await.unwrap();
        let now = player.now_playing().await.unwrap();
        assert_eq!(now.item.track_id, "t1");
        assert_eq!(now.index, 1);
        assert_eq!(now.queue_length, 3);
        assert_eq!(now.position, Duration::from_secs(5));
        assert_eq!(now.volume, 1.0);
    }

    #[tokio::test]
    async fn test_load_queue_stops_active_playback() {
        let (player, mut events) = player_with(accepting_adapter(Duration::ZERO));
        player.load_queue(items(1), 0).await.unwrap();
        player.play().await.unwrap();
        playback_events(&mut events);

        player.load_queue(items(2), 0).await.unwrap();
        assert_eq!(player.state().await, PlaybackState::Stopped);
        assert_eq!(
            playback_events(&mut events),
            vec![
                PlaybackEvent::Stopped {
                    track_id: Some("t0".to_string())
                },
                PlaybackEvent::QueueChanged { length: 2 },
            ]
        );
    }
}

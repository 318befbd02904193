//! End-to-end behavior of the service façade against an in-memory store.

use async_trait::async_trait;
use core_library::PageRequest;
use core_playback::{
    AudioFormat, AudioSource, PlaybackAdapter, PlaybackError, PlaybackState, SilentAdapter,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, LibraryEvent, ScanEvent};
use core_service::{ApiServer, CoreService, ServiceError};
use mockall::mock;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mock! {
    pub Output {}

    #[async_trait]
    impl PlaybackAdapter for Output {
        async fn play(&self, source: AudioSource, format: AudioFormat) -> core_playback::Result<()>;
        async fn pause(&self) -> core_playback::Result<()>;
        async fn resume(&self) -> core_playback::Result<()>;
        async fn stop(&self) -> core_playback::Result<()>;
        async fn seek(&self, position: Duration) -> core_playback::Result<()>;
        async fn set_volume(&self, volume: f32) -> core_playback::Result<()>;
        async fn get_position(&self) -> core_playback::Result<Duration>;
        async fn is_playing(&self) -> core_playback::Result<bool>;
    }
}

fn write_silent_wav(path: &Path, millis: u32) {
    let (sample_rate, channels, bits) = (8_000u32, 1u16, 16u16);
    let block_align = channels * bits / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = byte_rate / 1000 * millis;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);
    fs::write(path, bytes).unwrap();
}

async fn silent_service() -> CoreService {
    CoreService::new(CoreConfig::in_memory(), Arc::new(SilentAdapter::new()))
        .await
        .unwrap()
}

#[tokio::test]
async fn scan_then_play_a_playlist() {
    let dir = tempfile::tempdir().unwrap();
    write_silent_wav(&dir.path().join("a-side.wav"), 1_000);
    write_silent_wav(&dir.path().join("b-side.wav"), 1_500);
    fs::write(dir.path().join("notes.txt"), "not audio").unwrap();

    let service = silent_service().await;
    let mut events = service.subscribe();

    let user = service.create_user("listener", None).await.unwrap();
    let library = service
        .create_library(&user.id, "Home", &dir.path().display().to_string())
        .await
        .unwrap();

    let mut reported = Vec::new();
    let summary = service
        .scan_library(&library.id, |progress| reported.push(progress.percentage))
        .await
        .unwrap();
    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.imported, 2);
    assert_eq!(reported.last(), Some(&1.0));

    let drained = events.drain();
    assert!(matches!(
        drained.first(),
        Some(CoreEvent::Library(LibraryEvent::LibraryCreated { .. }))
    ));
    assert!(drained
        .iter()
        .any(|event| matches!(event, CoreEvent::Scan(ScanEvent::Completed { total_files: 2, .. }))));

    let tracks = service
        .list_tracks(&library.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(tracks.items.len(), 2);

    let playlist = service
        .create_playlist(&library.id, "Evening", Some("quiet ones"))
        .await
        .unwrap();
    for track in &tracks.items {
        service.add_to_playlist(&playlist.id, &track.id).await.unwrap();
    }
    assert!(service.move_playlist_item(&playlist.id, 1, 0).await.unwrap());
    let ordered = service.playlist_tracks(&playlist.id).await.unwrap();
    assert_eq!(ordered[0].id, tracks.items[1].id);

    let first = service.play_playlist(&playlist.id, 0).await.unwrap();
    assert_eq!(first.id, ordered[0].id);
    assert_eq!(first.play_count, 1);
    assert!(first.last_played_at.is_some());

    let now = service.now_playing().await.unwrap();
    assert_eq!(now.state, PlaybackState::Playing);
    assert_eq!(now.queue_length, 2);

    let second = service.next_track().await.unwrap().unwrap();
    assert_eq!(second.id, ordered[1].id);
    assert_eq!(second.play_count, 1);

    assert!(service.next_track().await.unwrap().is_none());
    assert_eq!(service.player().state().await, PlaybackState::Stopped);
}

#[tokio::test]
async fn playlist_changes_are_published() {
    let service = silent_service().await;
    let user = service.create_user("editor", None).await.unwrap();
    let library = service
        .create_library(&user.id, "Lib", "/srv/music")
        .await
        .unwrap();

    let mut events = service.subscribe();
    let playlist = service.create_playlist(&library.id, "Draft", None).await.unwrap();
    let renamed = service
        .rename_playlist(&playlist.id, "Final", Some("done"))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Final");
    assert!(service.delete_playlist(&playlist.id).await.unwrap());
    assert!(!service.delete_playlist(&playlist.id).await.unwrap());

    let library_events: Vec<_> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            CoreEvent::Library(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(
        library_events,
        vec![
            LibraryEvent::PlaylistCreated {
                playlist_id: playlist.id.clone(),
                name: "Draft".to_string(),
            },
            LibraryEvent::PlaylistUpdated {
                playlist_id: playlist.id.clone(),
                change_type: "renamed".to_string(),
            },
            LibraryEvent::PlaylistDeleted {
                playlist_id: playlist.id.clone(),
            },
        ]
    );
}

#[tokio::test]
async fn deleting_a_track_updates_playlists_and_publishes() {
    let dir = tempfile::tempdir().unwrap();
    write_silent_wav(&dir.path().join("keep.wav"), 1_000);
    write_silent_wav(&dir.path().join("drop.wav"), 1_000);

    let service = silent_service().await;
    let user = service.create_user("curator", None).await.unwrap();
    let library = service
        .create_library(&user.id, "Home", &dir.path().display().to_string())
        .await
        .unwrap();
    service.scan_library(&library.id, |_| {}).await.unwrap();

    let tracks = service
        .list_tracks(&library.id, PageRequest::default())
        .await
        .unwrap();
    let doomed = tracks
        .items
        .iter()
        .find(|track| track.file_path.ends_with("drop.wav"))
        .unwrap()
        .clone();
    let playlist = service.create_playlist(&library.id, "Mix", None).await.unwrap();
    for track in &tracks.items {
        service.add_to_playlist(&playlist.id, &track.id).await.unwrap();
    }

    let mut events = service.subscribe();
    assert!(service.delete_track(&doomed.id).await.unwrap());
    assert!(!service.delete_track(&doomed.id).await.unwrap());

    assert!(service.get_track(&doomed.id).await.unwrap().is_none());
    let remaining = service.playlist_tracks(&playlist.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].file_path.ends_with("keep.wav"));

    let deleted: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|event| matches!(event, CoreEvent::Library(LibraryEvent::TrackDeleted { .. })))
        .collect();
    assert_eq!(
        deleted,
        vec![CoreEvent::Library(LibraryEvent::TrackDeleted {
            track_id: doomed.id.clone(),
        })]
    );
}

#[tokio::test]
async fn two_libraries_can_scan_the_same_folder() {
    let dir = tempfile::tempdir().unwrap();
    write_silent_wav(&dir.path().join("shared.wav"), 1_000);
    let root = dir.path().display().to_string();

    let service = silent_service().await;
    let alice = service.create_user("alice", None).await.unwrap();
    let bob = service.create_user("bob", None).await.unwrap();
    let first = service.create_library(&alice.id, "Music", &root).await.unwrap();
    let second = service.create_library(&bob.id, "Music", &root).await.unwrap();

    for library in [&first, &second] {
        let summary = service.scan_library(&library.id, |_| {}).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.failed, 0);
    }

    let ours = service
        .list_tracks(&first.id, PageRequest::default())
        .await
        .unwrap();
    let theirs = service
        .list_tracks(&second.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ours.items.len(), 1);
    assert_eq!(theirs.items.len(), 1);
    assert_ne!(ours.items[0].id, theirs.items[0].id);
}

#[tokio::test]
async fn missing_entities_are_not_found() {
    let service = silent_service().await;

    assert!(matches!(
        service.create_library("ghost", "Lib", "/srv/music").await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.play_tracks(&["nope".to_string()], 0).await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.play_playlist("nope", 0).await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(service.get_track("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn empty_playlist_cannot_start() {
    let service = silent_service().await;
    let user = service.create_user("listener", None).await.unwrap();
    let library = service.create_library(&user.id, "Lib", "/srv/music").await.unwrap();
    let playlist = service.create_playlist(&library.id, "Empty", None).await.unwrap();

    assert!(matches!(
        service.play_playlist(&playlist.id, 0).await,
        Err(ServiceError::Playback(PlaybackError::EmptyQueue))
    ));
}

#[tokio::test]
async fn failed_output_does_not_count_a_play() {
    let dir = tempfile::tempdir().unwrap();
    write_silent_wav(&dir.path().join("only.wav"), 500);

    let mut output = MockOutput::new();
    output
        .expect_play()
        .returning(|_, _| Err(PlaybackError::AudioDeviceError("unplugged".to_string())));

    let service = CoreService::new(CoreConfig::in_memory(), Arc::new(output))
        .await
        .unwrap();
    let user = service.create_user("listener", None).await.unwrap();
    let library = service
        .create_library(&user.id, "Home", &dir.path().display().to_string())
        .await
        .unwrap();
    service.scan_library(&library.id, |_| {}).await.unwrap();

    let track = service
        .list_tracks(&library.id, PageRequest::default())
        .await
        .unwrap()
        .items
        .remove(0);
    assert!(matches!(
        service.play_tracks(&[track.id.clone()], 0).await,
        Err(ServiceError::Playback(PlaybackError::AudioDeviceError(_)))
    ));

    let unchanged = service.get_track(&track.id).await.unwrap().unwrap();
    assert_eq!(unchanged.play_count, 0);
}

#[tokio::test]
async fn volume_is_clamped_through_the_service() {
    let service = silent_service().await;
    assert_eq!(service.set_volume(3.0).await.unwrap(), 1.0);
    assert_eq!(service.player().volume().await, 1.0);
}

#[tokio::test]
async fn api_server_is_a_placeholder() {
    assert!(matches!(
        ApiServer::default().start().await,
        Err(ServiceError::NotImplemented(_))
    ));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn user_email_is_masked_in_logs() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let service = silent_service().await;
    let user = service
        .create_user("listener", Some("listener@example.org"))
        .await
        .unwrap();
    assert_eq!(user.email.as_deref(), Some("listener@example.org"));

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Created user"));
    assert!(output.contains("[REDACTED]"));
    assert!(!output.contains("example.org"));
}

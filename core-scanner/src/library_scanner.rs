//! Library scan pipeline
//!
//! ## Workflow
//!
//! 1. Resolve the library and check that its root exists
//! 2. Enumerate audio files on the blocking pool
//! 3. For each file: extract metadata, find-or-create the artist and album,
//!    upsert the track by path (which refreshes album aggregates)
//! 4. Report progress after every file, through the callback and the event bus
//! 5. Stamp `last_scanned_at` and emit the completion event
//!
//! A file that fails extraction or import is logged and counted; it never
//! aborts the scan.

use crate::error::{Result, ScanError};
use crate::file_scanner::FileScanner;
use crate::progress::{ScanProgress, ScanSummary};
use core_library::models::Track;
use core_library::repositories::{
    AlbumRepository, ArtistRepository, LibraryRepository, TrackRepository,
};
use core_metadata::MetadataSource;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, ScanEvent};
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Artist name used when a file has neither artist nor album artist tags
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Album title used when a file has no album tag
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Whether one file produced a new track or refreshed an existing one
enum ImportOutcome {
    Created,
    Updated,
}

/// Imports the audio files under a library root
pub struct LibraryScanner {
    libraries: Arc<dyn LibraryRepository>,
    artists: Arc<dyn ArtistRepository>,
    albums: Arc<dyn AlbumRepository>,
    tracks: Arc<dyn TrackRepository>,
    metadata: Arc<dyn MetadataSource>,
    file_scanner: FileScanner,
    event_bus: EventBus,
}

impl LibraryScanner {
    pub fn new(
        libraries: Arc<dyn LibraryRepository>,
        artists: Arc<dyn ArtistRepository>,
        albums: Arc<dyn AlbumRepository>,
        tracks: Arc<dyn TrackRepository>,
        metadata: Arc<dyn MetadataSource>,
        file_scanner: FileScanner,
        event_bus: EventBus,
    ) -> Self {
        Self {
            libraries,
            artists,
            albums,
            tracks,
            metadata,
            file_scanner,
            event_bus,
        }
    }

    /// Scan a library and import every audio file found under its root
    ///
    /// `on_progress` is invoked after each file, and exactly once with a
    /// complete snapshot when the root holds no audio files.
    ///
    /// # Errors
    ///
    /// - `LibraryNotFound` if no library has `library_id`
    /// - `RootNotFound`/`NotADirectory` if the library path is unusable
    /// - `Library` if stamping the scan time fails
    #[instrument(skip(self, on_progress))]
    pub async fn scan<F>(&self, library_id: &str, mut on_progress: F) -> Result<ScanSummary>
    where
        F: FnMut(&ScanProgress) + Send,
    {
        let started = Instant::now();
        let library = self
            .libraries
            .find_by_id(library_id)
            .await?
            .ok_or_else(|| ScanError::LibraryNotFound(library_id.to_string()))?;

        let files = match self.enumerate(PathBuf::from(&library.path)).await {
            Ok(files) => files,
            Err(e) => {
                self.emit(ScanEvent::Failed {
                    library_id: library_id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let total_files = files.len() as u64;
        info!(total_files, "Starting library scan");
        self.emit(ScanEvent::Started {
            library_id: library_id.to_string(),
            total_files,
        });

        let mut summary = ScanSummary {
            total_files,
            ..Default::default()
        };

        if files.is_empty() {
            self.report(library_id, ScanProgress::new(0, 0, None), &mut on_progress);
        }

        for path in &files {
            match self.import_file(library_id, path).await {
                Ok(ImportOutcome::Created) => summary.imported += 1,
                Ok(ImportOutcome::Updated) => summary.updated += 1,
                Err(e) => {
                    warn!(path = %strip_path(&path.display().to_string()), error = %e, "Failed to import file");
                    summary.failed += 1;
                }
            }
            summary.scanned_files += 1;

            let progress = ScanProgress::new(
                summary.scanned_files,
                total_files,
                Some(path.display().to_string()),
            );
            self.report(library_id, progress, &mut on_progress);
        }

        self.libraries
            .mark_scanned(library_id, chrono::Utc::now().timestamp())
            .await?;

        info!(
            imported = summary.imported,
            updated = summary.updated,
            failed = summary.failed,
            "Library scan complete"
        );
        self.emit(ScanEvent::Completed {
            library_id: library_id.to_string(),
            total_files: summary.total_files,
            scanned_files: summary.scanned_files,
            imported: summary.imported,
            updated: summary.updated,
            failed: summary.failed,
            duration_secs: started.elapsed().as_secs(),
        });

        Ok(summary)
    }

    async fn enumerate(&self, root: PathBuf) -> Result<Vec<PathBuf>> {
        let scanner = self.file_scanner.clone();
        tokio::task::spawn_blocking(move || scanner.scan_directory(&root))
            .await
            .map_err(|e| ScanError::Task(e.to_string()))?
    }

    async fn import_file(&self, library_id: &str, path: &Path) -> Result<ImportOutcome> {
        let metadata = self.metadata.extract(path).await?;

        let artist_name = metadata
            .album_artist
            .clone()
            .or_else(|| metadata.artist.clone())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let (artist, artist_created) = self
            .artists
            .find_or_create(library_id, &artist_name)
            .await?;
        if artist_created {
            self.emit_library(LibraryEvent::ArtistAdded {
                artist_id: artist.id.clone(),
                name: artist.name.clone(),
            });
        }

        let album_title = metadata
            .album
            .clone()
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
        let (album, album_created) = self
            .albums
            .find_or_create(&artist.id, &album_title, metadata.year)
            .await?;
        if album_created {
            self.emit_library(LibraryEvent::AlbumAdded {
                album_id: album.id.clone(),
                title: album.title.clone(),
                artist: Some(artist.name.clone()),
            });
        }

        let title = metadata.title.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

        let mut track = Track::new(
            album.id.clone(),
            title,
            path.display().to_string(),
            metadata.format.clone(),
        );
        track.track_number = metadata
            .track_number
            .and_then(|n| i32::try_from(n).ok())
            .filter(|n| *n > 0);
        track.disc_number = metadata.disc_number.and_then(|n| i32::try_from(n).ok());
        track.genre = metadata.genre.clone();
        track.duration_ms = i64::try_from(metadata.duration_ms).unwrap_or(i64::MAX);
        track.bitrate = metadata.bitrate.and_then(|b| i32::try_from(b).ok());
        track.sample_rate = metadata.sample_rate.and_then(|s| i32::try_from(s).ok());
        track.channels = metadata.channels.map(i32::from);
        track.file_size = i64::try_from(metadata.file_size).unwrap_or(i64::MAX);

        let (stored, created) = self.tracks.upsert(&track).await?;
        debug!(track_id = %stored.id, created, "Imported track");

        if created {
            self.emit_library(LibraryEvent::TrackAdded {
                track_id: stored.id,
                title: stored.title,
                artist: Some(artist.name),
                album: Some(album.title),
            });
            Ok(ImportOutcome::Created)
        } else {
            self.emit_library(LibraryEvent::TrackUpdated {
                track_id: stored.id,
            });
            Ok(ImportOutcome::Updated)
        }
    }

    fn report<F>(&self, library_id: &str, progress: ScanProgress, on_progress: &mut F)
    where
        F: FnMut(&ScanProgress),
    {
        on_progress(&progress);
        self.emit(ScanEvent::Progress {
            library_id: library_id.to_string(),
            scanned_files: progress.scanned_files,
            total_files: progress.total_files,
            percentage: progress.percentage,
            current_file: progress.current_file,
        });
    }

    // Publishing fails only when nobody is subscribed.
    fn emit(&self, event: ScanEvent) {
        self.event_bus.emit(CoreEvent::Scan(event)).ok();
    }

    fn emit_library(&self, event: LibraryEvent) {
        self.event_bus.emit(CoreEvent::Library(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_library::db::create_test_pool;
    use core_library::models::{Library, User};
    use core_library::repositories::*;
    use core_metadata::{ExtractedMetadata, MetadataError};
    use std::fs;
    use tempfile::TempDir;

    /// Tags derived from the file name: `artist - album - title.ext`;
    /// names containing "broken" fail.
    struct NameTags;

    #[async_trait]
    impl MetadataSource for NameTags {
        async fn extract(&self, path: &Path) -> core_metadata::Result<ExtractedMetadata> {
            let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
            if stem.contains("broken") {
                return Err(MetadataError::ExtractionFailed(stem));
            }

            let parts: Vec<&str> = stem.split(" - ").collect();
            let mut metadata = ExtractedMetadata {
                format: path.extension().unwrap().to_string_lossy().into_owned(),
                duration_ms: 60_000,
                ..Default::default()
            };
            if let [artist, album, title] = parts.as_slice() {
                metadata.artist = Some(artist.to_string());
                metadata.album = Some(album.to_string());
                metadata.title = Some(title.to_string());
            }
            Ok(metadata)
        }
    }

    /// Tags read from the file body, `artist - album - title`, so a test can
    /// retag a file in place.
    struct BodyTags;

    #[async_trait]
    impl MetadataSource for BodyTags {
        async fn extract(&self, path: &Path) -> core_metadata::Result<ExtractedMetadata> {
            let body = fs::read_to_string(path)?;
            let parts: Vec<&str> = body.trim().split(" - ").collect();
            let [artist, album, title] = parts.as_slice() else {
                return Err(MetadataError::ExtractionFailed(path.display().to_string()));
            };
            Ok(ExtractedMetadata {
                artist: Some(artist.to_string()),
                album: Some(album.to_string()),
                title: Some(title.to_string()),
                format: "flac".to_string(),
                duration_ms: 90_000,
                ..Default::default()
            })
        }
    }

    struct Harness {
        scanner: LibraryScanner,
        library: Library,
        tracks: Arc<SqliteTrackRepository>,
        albums: Arc<SqliteAlbumRepository>,
        event_bus: EventBus,
        _dir: TempDir,
    }

    async fn harness(files: &[&str]) -> Harness {
        harness_with(files, Arc::new(NameTags)).await
    }

    async fn harness_with(files: &[&str], metadata: Arc<dyn MetadataSource>) -> Harness {
        let dir = TempDir::new().unwrap();
        for name in files {
            fs::write(dir.path().join(name), b"audio").unwrap();
        }

        let pool = create_test_pool().await.unwrap();
        let user = User::new("scan".to_string(), None);
        SqliteUserRepository::new(pool.clone())
            .insert(&user)
            .await
            .unwrap();
        let library = Library::new(
            user.id.clone(),
            "Scan".to_string(),
            dir.path().display().to_string(),
        );
        let libraries = Arc::new(SqliteLibraryRepository::new(pool.clone()));
        libraries.insert(&library).await.unwrap();

        let tracks = Arc::new(SqliteTrackRepository::new(pool.clone()));
        let albums = Arc::new(SqliteAlbumRepository::new(pool.clone()));
        let event_bus = EventBus::new(256);
        let scanner = LibraryScanner::new(
            libraries,
            Arc::new(SqliteArtistRepository::new(pool.clone())),
            albums.clone(),
            tracks.clone(),
            metadata,
            FileScanner::new(),
            event_bus.clone(),
        );

        Harness {
            scanner,
            library,
            tracks,
            albums,
            event_bus,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_scan_imports_and_reports_progress() {
        let h = harness(&[
            "Coltrane - Ballads - Say It.mp3",
            "Coltrane - Ballads - Nancy.flac",
            "notes.txt",
        ])
        .await;

        let mut reports = Vec::new();
        let summary = h
            .scanner
            .scan(&h.library.id, |p| reports.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].percentage, 0.5);
        assert_eq!(reports.last().unwrap().percentage, 1.0);

        let page = h
            .tracks
            .query_by_library(&h.library.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let albums = h
            .albums
            .query_by_library(&h.library.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(albums.total, 1);
        assert_eq!(albums.items[0].track_count, 2);
        assert_eq!(albums.items[0].total_duration_ms, 120_000);
    }

    #[tokio::test]
    async fn test_rescan_updates_instead_of_duplicating() {
        let h = harness(&["A - B - C.mp3"]).await;

        h.scanner.scan(&h.library.id, |_| {}).await.unwrap();
        let mut completed = h
            .event_bus
            .stream()
            .filter(|e| matches!(e, CoreEvent::Scan(ScanEvent::Completed { .. })));
        let second = h.scanner.scan(&h.library.id, |_| {}).await.unwrap();

        assert_eq!(second.imported, 0);
        assert_eq!(second.updated, 1);
        assert_eq!(h.tracks.count(&h.library.id).await.unwrap(), 1);
        assert!(matches!(
            completed.drain().as_slice(),
            [CoreEvent::Scan(ScanEvent::Completed { imported: 0, updated: 1, failed: 0, .. })]
        ));
    }

    #[tokio::test]
    async fn test_retagged_file_moves_to_new_album() {
        let h = harness_with(&["nancy.flac"], Arc::new(BodyTags)).await;
        let file = h._dir.path().join("nancy.flac");

        fs::write(&file, "Coltrane - Ballads - Nancy").unwrap();
        h.scanner.scan(&h.library.id, |_| {}).await.unwrap();
        let before = h
            .tracks
            .query_by_library(&h.library.id, PageRequest::default())
            .await
            .unwrap()
            .items
            .remove(0);

        fs::write(&file, "Coltrane - Live at Birdland - Nancy").unwrap();
        let summary = h.scanner.scan(&h.library.id, |_| {}).await.unwrap();
        assert_eq!((summary.imported, summary.updated), (0, 1));

        let after = h.tracks.find_by_id(&before.id).await.unwrap().unwrap();
        assert_ne!(after.album_id, before.album_id);

        // The old album stays behind, empty.
        let old = h.albums.find_by_id(&before.album_id).await.unwrap().unwrap();
        assert_eq!(old.title, "Ballads");
        assert_eq!((old.track_count, old.total_duration_ms), (0, 0));

        let new = h.albums.find_by_id(&after.album_id).await.unwrap().unwrap();
        assert_eq!(new.title, "Live at Birdland");
        assert_eq!((new.track_count, new.total_duration_ms), (1, 90_000));
        assert_eq!(h.tracks.count(&h.library.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_file_is_counted_not_fatal() {
        let h = harness(&["broken.mp3", "X - Y - Z.ogg"]).await;

        let summary = h.scanner.scan(&h.library.id, |_| {}).await.unwrap();
        assert_eq!(summary.scanned_files, 2);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_untagged_file_uses_fallbacks() {
        let h = harness(&["loose take.wav"]).await;

        h.scanner.scan(&h.library.id, |_| {}).await.unwrap();

        let track = h
            .tracks
            .query_by_library(&h.library.id, PageRequest::default())
            .await
            .unwrap()
            .items
            .remove(0);
        assert_eq!(track.title, "loose take");

        let album = h.albums.find_by_id(&track.album_id).await.unwrap().unwrap();
        assert_eq!(album.title, UNKNOWN_ALBUM);
    }

    #[tokio::test]
    async fn test_empty_library_emits_single_terminal_progress() {
        let h = harness(&["readme.md"]).await;
        let mut stream = h.event_bus.stream().filter(|e| {
            matches!(e, CoreEvent::Scan(ScanEvent::Progress { .. }))
        });

        let mut reports = Vec::new();
        let summary = h
            .scanner
            .scan(&h.library.id, |p| reports.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(summary.total_files, 0);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].percentage, 1.0);

        let events = stream.drain();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_library_and_missing_root() {
        let h = harness(&[]).await;
        let err = h.scanner.scan("nope", |_| {}).await.unwrap_err();
        assert!(matches!(err, ScanError::LibraryNotFound(_)));

        let gone = h.library.path.clone();
        drop(h._dir);
        let err = h.scanner.scan(&h.library.id, |_| {}).await.unwrap_err();
        assert!(matches!(err, ScanError::RootNotFound(p) if p == gone));
    }
}

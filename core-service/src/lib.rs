//! Core service façade.
//!
//! [`CoreService`] owns the database pool, the repositories, the library
//! scanner, the player and the event bus, and is the single entry point a
//! host application talks to. Every dependency is built here and handed down
//! through constructors; the host only supplies a [`CoreConfig`] and its
//! audio output as a [`PlaybackAdapter`].
//!
//! ```rust,no_run
//! use core_playback::SilentAdapter;
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//! use std::sync::Arc;
//!
//! # async fn run() -> core_service::Result<()> {
//! let service = CoreService::new(CoreConfig::in_memory(), Arc::new(SilentAdapter::new())).await?;
//! let user = service.create_user("listener", None).await?;
//! let library = service.create_library(&user.id, "Music", "/home/listener/Music").await?;
//! service.scan_library(&library.id, |progress| println!("{:.0}%", progress.percentage * 100.0)).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod server;

pub use error::{Result, ServiceError};
pub use server::ApiServer;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::models::{Album, Artist, Library, Playlist, PlaylistItem, Track, User};
use core_library::repositories::{
    AlbumRepository, ArtistRepository, LibraryRepository, PlaylistRepository,
    SqliteAlbumRepository, SqliteArtistRepository, SqliteLibraryRepository,
    SqlitePlaylistRepository, SqliteTrackRepository, SqliteUserRepository, TrackRepository,
    UserRepository,
};
use core_library::{Page, PageRequest};
use core_metadata::MetadataExtractor;
use core_playback::{
    NowPlaying, PlaybackAdapter, PlaybackError, PlaybackState, Player, QueueItem, RepeatMode,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, LibraryEvent};
use core_runtime::logging::redact_if_sensitive;
use core_scanner::{FileScanner, LibraryScanner, ScanProgress, ScanSummary};
use sqlx::SqlitePool;
use tracing::{info, instrument};

struct Repositories {
    users: Arc<dyn UserRepository>,
    libraries: Arc<dyn LibraryRepository>,
    artists: Arc<dyn ArtistRepository>,
    albums: Arc<dyn AlbumRepository>,
    tracks: Arc<dyn TrackRepository>,
    playlists: Arc<dyn PlaylistRepository>,
}

impl Repositories {
    fn sqlite(pool: &SqlitePool) -> Self {
        Self {
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            libraries: Arc::new(SqliteLibraryRepository::new(pool.clone())),
            artists: Arc::new(SqliteArtistRepository::new(pool.clone())),
            albums: Arc::new(SqliteAlbumRepository::new(pool.clone())),
            tracks: Arc::new(SqliteTrackRepository::new(pool.clone())),
            playlists: Arc::new(SqlitePlaylistRepository::new(pool.clone())),
        }
    }
}

struct ServiceInner {
    config: CoreConfig,
    pool: SqlitePool,
    repos: Repositories,
    scanner: LibraryScanner,
    player: Player,
    event_bus: EventBus,
}

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share one pool, player and event bus.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Validate `config`, open (and migrate) the database and wire every
    /// component.
    pub async fn new(config: CoreConfig, adapter: Arc<dyn PlaybackAdapter>) -> Result<Self> {
        config.validate()?;

        let database = match &config.database_path {
            Some(path) => DatabaseConfig::new(path),
            None => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(database).await?;

        Self::with_pool(config, pool, adapter)
    }

    /// Wire the service around an existing, migrated pool.
    pub fn with_pool(
        config: CoreConfig,
        pool: SqlitePool,
        adapter: Arc<dyn PlaybackAdapter>,
    ) -> Result<Self> {
        config.validate()?;
        let event_bus = EventBus::new(config.event_buffer_size);
        let repos = Repositories::sqlite(&pool);

        let scanner = LibraryScanner::new(
            repos.libraries.clone(),
            repos.artists.clone(),
            repos.albums.clone(),
            repos.tracks.clone(),
            Arc::new(MetadataExtractor::new()),
            FileScanner::from_config(&config),
            event_bus.clone(),
        );
        let player = Player::new(adapter, event_bus.clone());

        info!(
            in_memory = config.database_path.is_none(),
            "Core service initialized"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                pool,
                repos,
                scanner,
                player,
                event_bus,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn player(&self) -> &Player {
        &self.inner.player
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> EventStream {
        self.inner.event_bus.stream()
    }

    fn emit(&self, event: LibraryEvent) {
        self.inner.event_bus.emit(CoreEvent::Library(event)).ok();
    }

    // ------------------------------------------------------------------
    // Users and libraries
    // ------------------------------------------------------------------

    pub async fn create_user(&self, username: &str, email: Option<&str>) -> Result<User> {
        let user = User::new(username.to_string(), email.map(str::to_string));
        self.inner.repos.users.insert(&user).await?;
        info!(
            user_id = %user.id,
            email = %redact_if_sensitive("email", user.email.as_deref().unwrap_or_default()),
            "Created user"
        );
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.inner.repos.users.find_by_id(id).await?)
    }

    pub async fn list_users(&self, page: PageRequest) -> Result<Page<User>> {
        Ok(self.inner.repos.users.query(page).await?)
    }

    /// Stamp a sign-in for `user_id`.
    pub async fn record_login(&self, user_id: &str) -> Result<()> {
        self.inner
            .repos
            .users
            .record_login(user_id, Utc::now().timestamp())
            .await?;
        Ok(())
    }

    /// Register a library root for `user_id`. The path is not scanned.
    pub async fn create_library(&self, user_id: &str, name: &str, path: &str) -> Result<Library> {
        if self.inner.repos.users.find_by_id(user_id).await?.is_none() {
            return Err(ServiceError::not_found("User", user_id));
        }

        let library = Library::new(user_id.to_string(), name.to_string(), path.to_string());
        self.inner.repos.libraries.insert(&library).await?;
        info!("Created library {} at {}", library.name, library.path);

        self.emit(LibraryEvent::LibraryCreated {
            library_id: library.id.clone(),
            name: library.name.clone(),
        });
        Ok(library)
    }

    pub async fn get_library(&self, id: &str) -> Result<Option<Library>> {
        Ok(self.inner.repos.libraries.find_by_id(id).await?)
    }

    pub async fn list_libraries(&self, user_id: &str) -> Result<Vec<Library>> {
        Ok(self.inner.repos.libraries.find_by_user(user_id).await?)
    }

    /// Delete a library and everything it owns.
    pub async fn delete_library(&self, id: &str) -> Result<bool> {
        Ok(self.inner.repos.libraries.delete(id).await?)
    }

    /// Scan the library root and import its audio files.
    #[instrument(skip(self, on_progress))]
    pub async fn scan_library<F>(&self, library_id: &str, on_progress: F) -> Result<ScanSummary>
    where
        F: FnMut(&ScanProgress) + Send,
    {
        Ok(self.inner.scanner.scan(library_id, on_progress).await?)
    }

    // ------------------------------------------------------------------
    // Browsing
    // ------------------------------------------------------------------

    pub async fn list_artists(&self, library_id: &str, page: PageRequest) -> Result<Page<Artist>> {
        Ok(self.inner.repos.artists.query(library_id, page).await?)
    }

    pub async fn search_artists(
        &self,
        library_id: &str,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<Artist>> {
        Ok(self.inner.repos.artists.search(library_id, query, page).await?)
    }

    pub async fn list_albums(&self, library_id: &str, page: PageRequest) -> Result<Page<Album>> {
        Ok(self.inner.repos.albums.query_by_library(library_id, page).await?)
    }

    pub async fn list_artist_albums(&self, artist_id: &str, page: PageRequest) -> Result<Page<Album>> {
        Ok(self.inner.repos.albums.query_by_artist(artist_id, page).await?)
    }

    pub async fn list_tracks(&self, library_id: &str, page: PageRequest) -> Result<Page<Track>> {
        Ok(self.inner.repos.tracks.query_by_library(library_id, page).await?)
    }

    pub async fn list_album_tracks(&self, album_id: &str, page: PageRequest) -> Result<Page<Track>> {
        Ok(self.inner.repos.tracks.query_by_album(album_id, page).await?)
    }

    pub async fn get_track(&self, id: &str) -> Result<Option<Track>> {
        Ok(self.inner.repos.tracks.find_by_id(id).await?)
    }

    /// Remove a track; its album aggregates are recomputed.
    pub async fn delete_track(&self, id: &str) -> Result<bool> {
        let deleted = self.inner.repos.tracks.delete(id).await?;
        if deleted {
            self.emit(LibraryEvent::TrackDeleted {
                track_id: id.to_string(),
            });
        }
        Ok(deleted)
    }

    /// Tracks whose title, artist or album contains `query`.
    pub async fn search_tracks(
        &self,
        library_id: &str,
        query: &str,
        page: PageRequest,
    ) -> Result<Page<Track>> {
        Ok(self.inner.repos.tracks.search(library_id, query, page).await?)
    }

    // ------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------

    pub async fn create_playlist(
        &self,
        library_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Playlist> {
        let mut playlist = Playlist::new(library_id.to_string(), name.to_string());
        playlist.description = description.map(str::to_string);
        self.inner.repos.playlists.insert(&playlist).await?;

        self.emit(LibraryEvent::PlaylistCreated {
            playlist_id: playlist.id.clone(),
            name: playlist.name.clone(),
        });
        Ok(playlist)
    }

    pub async fn get_playlist(&self, id: &str) -> Result<Option<Playlist>> {
        Ok(self.inner.repos.playlists.find_by_id(id).await?)
    }

    pub async fn list_playlists(&self, library_id: &str, page: PageRequest) -> Result<Page<Playlist>> {
        Ok(self.inner.repos.playlists.query_by_library(library_id, page).await?)
    }

    pub async fn rename_playlist(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Playlist> {
        let mut playlist = self
            .inner
            .repos
            .playlists
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Playlist", id))?;

        playlist.name = name.to_string();
        playlist.description = description.map(str::to_string);
        playlist.updated_at = Utc::now().timestamp();
        self.inner.repos.playlists.update(&playlist).await?;

        self.playlist_changed(id, "renamed");
        Ok(playlist)
    }

    pub async fn delete_playlist(&self, id: &str) -> Result<bool> {
        let deleted = self.inner.repos.playlists.delete(id).await?;
        if deleted {
            self.emit(LibraryEvent::PlaylistDeleted {
                playlist_id: id.to_string(),
            });
        }
        Ok(deleted)
    }

    /// Tracks of a playlist in position order.
    pub async fn playlist_tracks(&self, id: &str) -> Result<Vec<Track>> {
        Ok(self.inner.repos.playlists.tracks(id).await?)
    }

    pub async fn playlist_items(&self, id: &str) -> Result<Vec<PlaylistItem>> {
        Ok(self.inner.repos.playlists.items(id).await?)
    }

    pub async fn add_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<PlaylistItem> {
        let item = self.inner.repos.playlists.add_track(playlist_id, track_id).await?;
        self.playlist_changed(playlist_id, "item_added");
        Ok(item)
    }

    pub async fn insert_into_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: usize,
    ) -> Result<PlaylistItem> {
        let item = self
            .inner
            .repos
            .playlists
            .insert_track(playlist_id, track_id, position)
            .await?;
        self.playlist_changed(playlist_id, "item_added");
        Ok(item)
    }

    /// Remove the item at `position`; `None` when out of bounds.
    pub async fn remove_from_playlist(
        &self,
        playlist_id: &str,
        position: usize,
    ) -> Result<Option<PlaylistItem>> {
        let removed = self
            .inner
            .repos
            .playlists
            .remove_item(playlist_id, position)
            .await?;
        if removed.is_some() {
            self.playlist_changed(playlist_id, "item_removed");
        }
        Ok(removed)
    }

    /// Move an item between positions; `false` when nothing changed.
    pub async fn move_playlist_item(
        &self,
        playlist_id: &str,
        source: usize,
        destination: usize,
    ) -> Result<bool> {
        let moved = self
            .inner
            .repos
            .playlists
            .move_item(playlist_id, source, destination)
            .await?;
        if moved {
            self.playlist_changed(playlist_id, "item_moved");
        }
        Ok(moved)
    }

    fn playlist_changed(&self, playlist_id: &str, change_type: &str) {
        self.emit(LibraryEvent::PlaylistUpdated {
            playlist_id: playlist_id.to_string(),
            change_type: change_type.to_string(),
        });
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Queue `track_ids` in order and start the one at `start`.
    #[instrument(skip(self, track_ids), fields(count = track_ids.len()))]
    pub async fn play_tracks(&self, track_ids: &[String], start: usize) -> Result<Track> {
        let mut tracks = Vec::with_capacity(track_ids.len());
        for id in track_ids {
            let track = self
                .inner
                .repos
                .tracks
                .find_by_id(id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Track", id))?;
            tracks.push(track);
        }
        self.start_queue(&tracks, start).await
    }

    /// Queue a playlist and start the entry at `start`.
    pub async fn play_playlist(&self, playlist_id: &str, start: usize) -> Result<Track> {
        if self.inner.repos.playlists.find_by_id(playlist_id).await?.is_none() {
            return Err(ServiceError::not_found("Playlist", playlist_id));
        }
        let tracks = self.inner.repos.playlists.tracks(playlist_id).await?;
        self.start_queue(&tracks, start).await
    }

    async fn start_queue(&self, tracks: &[Track], start: usize) -> Result<Track> {
        if tracks.is_empty() {
            return Err(PlaybackError::EmptyQueue.into());
        }
        if start >= tracks.len() {
            return Err(PlaybackError::QueueIndexOutOfRange {
                index: start,
                len: tracks.len(),
            }
            .into());
        }

        let items = tracks.iter().map(queue_item).collect();
        self.inner.player.load_queue(items, start).await?;
        let started = self.inner.player.play().await?;
        self.record_play(&started).await
    }

    async fn record_play(&self, item: &QueueItem) -> Result<Track> {
        let track = self
            .inner
            .repos
            .tracks
            .record_play(&item.track_id, Utc::now().timestamp())
            .await?;
        self.emit(LibraryEvent::TrackUpdated {
            track_id: track.id.clone(),
        });
        Ok(track)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.inner.player.pause().await?)
    }

    pub async fn resume(&self) -> Result<()> {
        Ok(self.inner.player.resume().await?)
    }

    /// Play/pause toggle. Starting from stopped counts as a play.
    pub async fn toggle_playback(&self) -> Result<PlaybackState> {
        let before = self.inner.player.state().await;
        let after = self.inner.player.toggle().await?;
        if before == PlaybackState::Stopped {
            if let Some(now) = self.inner.player.now_playing().await {
                self.record_play(&now.item).await?;
            }
        }
        Ok(after)
    }

    pub async fn stop(&self) -> Result<()> {
        Ok(self.inner.player.stop().await?)
    }

    /// Skip forward; `None` once the queue is exhausted.
    pub async fn next_track(&self) -> Result<Option<Track>> {
        match self.inner.player.next().await? {
            Some(item) => self.record_play(&item).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn previous_track(&self) -> Result<Track> {
        let item = self.inner.player.previous().await?;
        self.record_play(&item).await
    }

    /// Host notification that the current track ended.
    pub async fn track_finished(&self) -> Result<Option<Track>> {
        match self.inner.player.track_finished().await? {
            Some(item) => self.record_play(&item).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        Ok(self.inner.player.seek(position).await?)
    }

    /// Returns the volume actually applied after clamping.
    pub async fn set_volume(&self, volume: f32) -> Result<f32> {
        Ok(self.inner.player.set_volume(volume).await?)
    }

    pub async fn set_repeat_mode(&self, repeat: RepeatMode) {
        self.inner.player.set_repeat_mode(repeat).await;
    }

    pub async fn now_playing(&self) -> Option<NowPlaying> {
        self.inner.player.now_playing().await
    }
}

fn queue_item(track: &Track) -> QueueItem {
    let mut item = QueueItem::new(track.id.clone(), track.title.clone(), track.file_path.clone())
        .with_signal(
            track.sample_rate.and_then(|rate| u32::try_from(rate).ok()),
            track.channels.and_then(|channels| u16::try_from(channels).ok()),
        );
    if let Ok(duration_ms) = u64::try_from(track.duration_ms) {
        if duration_ms > 0 {
            item = item.with_duration_ms(duration_ms);
        }
    }
    item
}

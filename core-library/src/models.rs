//! Domain models for the music library
//!
//! Ownership runs User → Library → Artist → Album → Track, with playlists
//! hanging off a library. Every constructor stamps `created_at`/`updated_at`
//! (Unix seconds) and assigns a UUID v4 identifier.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Normalize a string for lookups and searching (lowercase, trimmed).
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

// =============================================================================
// Domain Models
// =============================================================================

/// Person who owns one or more libraries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    /// Deactivated users keep their data but cannot sign in
    pub is_active: bool,
    pub last_login_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(username: String, email: Option<String>) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            username,
            email,
            is_active: true,
            last_login_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Validate user data
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("Username cannot be empty".to_string());
        }

        if let Some(email) = &self.email {
            let valid = email
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                .unwrap_or(false);
            if !valid {
                return Err(format!("Invalid email address: {}", email));
            }
        }

        Ok(())
    }
}

/// Named collection rooted at a filesystem path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Library {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Root directory scanned for audio files
    pub path: String,
    pub last_scanned_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Library {
    pub fn new(user_id: String, name: String, path: String) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            user_id,
            name,
            path,
            last_scanned_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Validate library data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Library name cannot be empty".to_string());
        }

        if self.path.trim().is_empty() {
            return Err("Library path cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Artist with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    pub id: String,
    pub library_id: String,
    pub name: String,
    /// Lookup key; one artist per normalized name per library
    pub normalized_name: String,
    /// Name used for ordering (e.g., "Beatles, The")
    pub sort_name: Option<String>,
    /// Identifier in an external catalogue such as MusicBrainz
    pub external_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Artist {
    /// Create a new artist with normalized name
    pub fn new(library_id: String, name: String) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            library_id,
            normalized_name: normalize(&name),
            name,
            sort_name: None,
            external_id: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Validate artist data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Artist name cannot be empty".to_string());
        }

        if self.normalized_name != normalize(&self.name) {
            return Err("Artist normalized name is out of date".to_string());
        }

        Ok(())
    }

    /// Rename the artist and refresh its lookup key.
    pub fn rename(&mut self, name: String) {
        self.normalized_name = normalize(&name);
        self.name = name;
        self.updated_at = now();
    }
}

/// Album with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    /// Lookup key; one album per normalized title per artist
    pub normalized_title: String,
    pub sort_title: Option<String>,
    pub year: Option<i32>,
    /// Cached number of tracks, refreshed by the track repository
    pub track_count: i64,
    /// Cached sum of track durations in milliseconds
    pub total_duration_ms: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Album {
    /// Create a new album with normalized title
    pub fn new(artist_id: String, title: String) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            artist_id,
            normalized_title: normalize(&title),
            title,
            sort_title: None,
            year: None,
            track_count: 0,
            total_duration_ms: 0,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Validate album data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Album title cannot be empty".to_string());
        }

        if self.normalized_title != normalize(&self.title) {
            return Err("Album normalized title is out of date".to_string());
        }

        if let Some(year) = self.year {
            if !(1000..=9999).contains(&year) {
                return Err(format!("Album year {} is out of valid range", year));
            }
        }

        if self.track_count < 0 || self.total_duration_ms < 0 {
            return Err("Album aggregates cannot be negative".to_string());
        }

        Ok(())
    }
}

/// Audio file in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: String,
    pub album_id: String,

    // Metadata
    pub title: String,
    pub normalized_title: String,
    pub track_number: Option<i32>,
    pub disc_number: Option<i32>,
    pub genre: Option<String>,

    // File and audio properties
    /// Absolute path; unique across the store
    pub file_path: String,
    /// Duration in milliseconds
    pub duration_ms: i64,
    /// Container format (mp3, flac, m4a, etc.)
    pub format: String,
    /// Bitrate in kbps
    pub bitrate: Option<i32>,
    /// Sample rate in Hz
    pub sample_rate: Option<i32>,
    pub channels: Option<i32>,
    /// File size in bytes
    pub file_size: i64,

    // Listening history
    pub play_count: i64,
    pub last_played_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Track {
    pub fn new(album_id: String, title: String, file_path: String, format: String) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            album_id,
            normalized_title: normalize(&title),
            title,
            track_number: None,
            disc_number: None,
            genre: None,
            file_path,
            duration_ms: 0,
            format,
            bitrate: None,
            sample_rate: None,
            channels: None,
            file_size: 0,
            play_count: 0,
            last_played_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }

        if self.file_path.trim().is_empty() {
            return Err("Track file path cannot be empty".to_string());
        }

        if self.format.trim().is_empty() {
            return Err("Track format cannot be empty".to_string());
        }

        if self.duration_ms < 0 {
            return Err("Track duration cannot be negative".to_string());
        }

        if let Some(track_number) = self.track_number {
            if track_number <= 0 {
                return Err("Track number must be positive".to_string());
            }
        }

        if self.file_size < 0 || self.play_count < 0 {
            return Err("Track size and play count cannot be negative".to_string());
        }

        Ok(())
    }

    /// Duration in fractional seconds, for display formatting.
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Ordered collection of tracks within a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: String,
    pub library_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Flag only; no rule evaluation backs it
    pub is_smart: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Playlist {
    pub fn new(library_id: String, name: String) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            library_id,
            name,
            description: None,
            is_smart: false,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Validate playlist data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }

        Ok(())
    }
}

/// A track placed at a zero-based position in a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistItem {
    pub id: String,
    pub playlist_id: String,
    pub track_id: String,
    /// Dense within a playlist: positions are exactly `0..len`
    pub position: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlaylistItem {
    pub fn new(playlist_id: String, track_id: String, position: i64) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            playlist_id,
            track_id,
            position,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.position < 0 {
            return Err(format!("Playlist position {} is negative", self.position));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_stamp_ids_and_timestamps() {
        let a = Artist::new("lib".to_string(), "Nina Simone".to_string());
        let b = Artist::new("lib".to_string(), "Nina Simone".to_string());
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
        assert_eq!(a.created_at, a.updated_at);
        assert!(a.created_at > 0);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  The Beatles "), "the beatles");
        let album = Album::new("artist".to_string(), " Abbey ROAD".to_string());
        assert_eq!(album.normalized_title, "abbey road");
    }

    #[test]
    fn test_artist_rename_refreshes_key() {
        let mut artist = Artist::new("lib".to_string(), "Prince".to_string());
        artist.rename("The Artist".to_string());
        assert_eq!(artist.normalized_name, "the artist");
        assert!(artist.validate().is_ok());
    }

    #[test]
    fn test_user_validation() {
        let user = User::new("ana".to_string(), Some("ana@example.com".to_string()));
        assert!(user.validate().is_ok());
        assert!(user.is_active);

        let bad_email = User::new("ana".to_string(), Some("not-an-email".to_string()));
        assert!(bad_email.validate().is_err());

        let no_name = User::new("  ".to_string(), None);
        assert!(no_name.validate().is_err());
    }

    #[test]
    fn test_album_year_range() {
        let mut album = Album::new("artist".to_string(), "Kind of Blue".to_string());
        album.year = Some(1959);
        assert!(album.validate().is_ok());
        album.year = Some(42);
        assert!(album.validate().is_err());
    }

    #[test]
    fn test_track_validation() {
        let mut track = Track::new(
            "album".to_string(),
            "So What".to_string(),
            "/music/so_what.flac".to_string(),
            "flac".to_string(),
        );
        assert!(track.validate().is_ok());
        assert_eq!(track.play_count, 0);

        track.duration_ms = 562_000;
        assert_eq!(track.duration_secs(), 562.0);

        track.track_number = Some(0);
        assert!(track.validate().is_err());
    }

    #[test]
    fn test_playlist_defaults() {
        let playlist = Playlist::new("lib".to_string(), "Favourites".to_string());
        assert!(!playlist.is_smart);
        assert!(playlist.validate().is_ok());

        let item = PlaylistItem::new(playlist.id.clone(), "track".to_string(), -1);
        assert!(item.validate().is_err());
    }
}

//! # Repository Pattern Implementation
//!
//! One trait per entity plus a SQLite implementation over `sqlx`.
//!
//! - Lookups return `Ok(None)` when nothing matches
//! - Inserts and updates validate the model first (`LibraryError::InvalidInput`)
//! - Updates of a missing row fail with `LibraryError::NotFound`
//! - Listings are paginated with [`PageRequest`]/[`Page`]
//!
//! ## Available Repositories
//!
//! - `UserRepository` - Accounts that own libraries
//! - `LibraryRepository` - Library roots and scan timestamps
//! - `ArtistRepository` - Artists with find-or-create per library
//! - `AlbumRepository` - Albums with find-or-create per artist and cached aggregates
//! - `TrackRepository` - Tracks, upsert by file path, search and play history
//! - `PlaylistRepository` - Playlists and their densely ordered items

pub mod album;
pub mod artist;
pub mod library;
pub mod pagination;
pub mod playlist;
pub mod track;
pub mod user;

pub use album::{AlbumRepository, SqliteAlbumRepository};
pub use artist::{ArtistRepository, SqliteArtistRepository};
pub use library::{LibraryRepository, SqliteLibraryRepository};
pub use pagination::{Page, PageRequest};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use track::{SqliteTrackRepository, TrackRepository};
pub use user::{SqliteUserRepository, UserRepository};

/// Build a `LIKE` pattern matching `needle` anywhere, with `\` as the escape.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in crate::models::normalize(needle).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

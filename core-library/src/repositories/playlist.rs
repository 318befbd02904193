//! Playlist repository trait and implementation
//!
//! Item positions are renumbered with the functions in [`crate::ordering`]
//! and written back in one transaction, so a playlist's positions are always
//! `0..len` once a call returns. Deleting a row (directly or by cascade from
//! its track) is closed up by the `playlist_items_close_gap` trigger.

use std::collections::HashMap;

use crate::error::{LibraryError, Result};
use crate::models::{Playlist, PlaylistItem, Track};
use crate::ordering;
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Find a playlist by ID, `Ok(None)` when absent
    async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>>;

    /// Insert a new playlist
    async fn insert(&self, playlist: &Playlist) -> Result<()>;

    /// Update name, description and smart flag
    ///
    /// # Errors
    /// Returns `NotFound` if the playlist does not exist
    async fn update(&self, playlist: &Playlist) -> Result<()>;

    /// Delete a playlist and its items
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Playlists of a library ordered by name
    async fn query_by_library(
        &self,
        library_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Playlist>>;

    /// Count playlists in a library
    async fn count(&self, library_id: &str) -> Result<i64>;

    /// Items of a playlist ordered by position
    async fn items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>>;

    /// Tracks of a playlist in playlist order (a track may appear more than once)
    async fn tracks(&self, playlist_id: &str) -> Result<Vec<Track>>;

    /// Append a track to the end of the playlist
    async fn add_track(&self, playlist_id: &str, track_id: &str) -> Result<PlaylistItem>;

    /// Insert a track at `position`, shifting later items down
    ///
    /// A position past the end appends.
    async fn insert_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: usize,
    ) -> Result<PlaylistItem>;

    /// Remove the item at `position`, closing the gap
    ///
    /// Returns `Ok(None)` when the position is out of bounds.
    async fn remove_item(&self, playlist_id: &str, position: usize)
        -> Result<Option<PlaylistItem>>;

    /// Move the item at `source` to `destination`
    ///
    /// Returns `Ok(false)` without touching the store when either index is
    /// out of bounds or both are equal.
    async fn move_item(&self, playlist_id: &str, source: usize, destination: usize)
        -> Result<bool>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_items(
        tx: &mut Transaction<'_, Sqlite>,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItem>> {
        let exists: Option<(String,)> = query_as("SELECT id FROM playlists WHERE id = ?")
            .bind(playlist_id)
            .fetch_optional(&mut **tx)
            .await?;
        if exists.is_none() {
            return Err(LibraryError::not_found("Playlist", playlist_id));
        }

        let items = query_as::<_, PlaylistItem>(
            "SELECT * FROM playlist_items WHERE playlist_id = ? ORDER BY position ASC",
        )
        .bind(playlist_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(items)
    }

    /// Write back every position that differs from `before`.
    async fn persist_positions(
        tx: &mut Transaction<'_, Sqlite>,
        before: &HashMap<String, i64>,
        after: &[PlaylistItem],
    ) -> Result<()> {
        let ts = chrono::Utc::now().timestamp();
        for item in after {
            if before.get(&item.id) == Some(&item.position) {
                continue;
            }
            query("UPDATE playlist_items SET position = ?, updated_at = ? WHERE id = ?")
                .bind(item.position)
                .bind(ts)
                .bind(&item.id)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }

    async fn insert_item(tx: &mut Transaction<'_, Sqlite>, item: &PlaylistItem) -> Result<()> {
        item.validate()
            .map_err(|e| LibraryError::invalid("PlaylistItem", e))?;

        query(
            r#"
            INSERT INTO playlist_items (id, playlist_id, track_id, position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.playlist_id)
        .bind(&item.track_id)
        .bind(item.position)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn touch(tx: &mut Transaction<'_, Sqlite>, playlist_id: &str) -> Result<()> {
        query("UPDATE playlists SET updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(playlist_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

fn positions(items: &[PlaylistItem]) -> HashMap<String, i64> {
    items
        .iter()
        .map(|item| (item.id.clone(), item.position))
        .collect()
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>> {
        let playlist = query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(playlist)
    }

    async fn insert(&self, playlist: &Playlist) -> Result<()> {
        playlist
            .validate()
            .map_err(|e| LibraryError::invalid("Playlist", e))?;

        query(
            r#"
            INSERT INTO playlists (id, library_id, name, description, is_smart, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.library_id)
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(playlist.is_smart)
        .bind(playlist.created_at)
        .bind(playlist.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, playlist: &Playlist) -> Result<()> {
        playlist
            .validate()
            .map_err(|e| LibraryError::invalid("Playlist", e))?;

        let result = query(
            "UPDATE playlists SET name = ?, description = ?, is_smart = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(playlist.is_smart)
        .bind(chrono::Utc::now().timestamp())
        .bind(&playlist.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Playlist", &playlist.id));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_by_library(
        &self,
        library_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Playlist>> {
        let total = self.count(library_id).await?;

        let playlists = query_as::<_, Playlist>(
            r#"
            SELECT * FROM playlists
            WHERE library_id = ?
            ORDER BY name COLLATE NOCASE ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(library_id)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(playlists, total as u64, page_request))
    }

    async fn count(&self, library_id: &str) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM playlists WHERE library_id = ?")
            .bind(library_id)
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }

    async fn items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>> {
        let items = query_as::<_, PlaylistItem>(
            "SELECT * FROM playlist_items WHERE playlist_id = ? ORDER BY position ASC",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let tracks = query_as::<_, Track>(
            r#"
            SELECT t.* FROM playlist_items pi
            INNER JOIN tracks t ON t.id = pi.track_id
            WHERE pi.playlist_id = ?
            ORDER BY pi.position ASC
            "#,
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }

    async fn add_track(&self, playlist_id: &str, track_id: &str) -> Result<PlaylistItem> {
        self.insert_track(playlist_id, track_id, usize::MAX).await
    }

    #[instrument(skip(self))]
    async fn insert_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: usize,
    ) -> Result<PlaylistItem> {
        let mut tx = self.pool.begin().await?;
        let mut items = Self::load_items(&mut tx, playlist_id).await?;
        let before = positions(&items);

        let item = PlaylistItem::new(playlist_id.to_string(), track_id.to_string(), 0);
        let landed = ordering::insert_at(&mut items, item, position);
        let index = landed as usize;

        Self::persist_positions(&mut tx, &before, &items[..index]).await?;
        Self::persist_positions(&mut tx, &before, &items[index + 1..]).await?;
        Self::insert_item(&mut tx, &items[index]).await?;
        Self::touch(&mut tx, playlist_id).await?;
        tx.commit().await?;

        debug!(position = landed, "Inserted playlist item");
        Ok(items.swap_remove(index))
    }

    #[instrument(skip(self))]
    async fn remove_item(
        &self,
        playlist_id: &str,
        position: usize,
    ) -> Result<Option<PlaylistItem>> {
        let mut tx = self.pool.begin().await?;
        let mut items = Self::load_items(&mut tx, playlist_id).await?;

        let Some(removed) = ordering::remove_at(&mut items, position) else {
            return Ok(None);
        };

        // The close-gap trigger renumbers the rows after it.
        query("DELETE FROM playlist_items WHERE id = ?")
            .bind(&removed.id)
            .execute(&mut *tx)
            .await?;
        Self::touch(&mut tx, playlist_id).await?;
        tx.commit().await?;

        Ok(Some(removed))
    }

    #[instrument(skip(self))]
    async fn move_item(
        &self,
        playlist_id: &str,
        source: usize,
        destination: usize,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let mut items = Self::load_items(&mut tx, playlist_id).await?;
        let before = positions(&items);

        if !ordering::move_item(&mut items, source, destination) {
            return Ok(false);
        }

        Self::persist_positions(&mut tx, &before, &items).await?;
        Self::touch(&mut tx, playlist_id).await?;
        tx.commit().await?;

        Ok(true)
    }
}

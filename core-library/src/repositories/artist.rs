//! Artist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{normalize, Artist};
use crate::repositories::{contains_pattern, Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

/// Artist repository interface for data access operations
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    /// Find an artist by its ID
    ///
    /// # Returns
    /// - `Ok(Some(artist))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>>;

    /// Find artist by name within a library, ignoring case and surrounding whitespace
    async fn find_by_name(&self, library_id: &str, name: &str) -> Result<Option<Artist>>;

    /// Return the library's artist with this name, creating it if needed
    ///
    /// Calling it twice with the same name yields the same artist, also when
    /// two scans race on it. The flag is `true` when the artist was created
    /// by this call.
    async fn find_or_create(&self, library_id: &str, name: &str) -> Result<(Artist, bool)>;

    /// Insert a new artist
    ///
    /// # Errors
    /// Returns error if:
    /// - Artist with same ID already exists
    /// - Artist validation fails
    /// - Database error occurs
    async fn insert(&self, artist: &Artist) -> Result<()>;

    /// Update an existing artist
    ///
    /// # Errors
    /// Returns `NotFound` if the artist does not exist
    async fn update(&self, artist: &Artist) -> Result<()>;

    /// Delete an artist (and its albums and tracks) by ID
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Artists of a library ordered by sort name, then name
    async fn query(&self, library_id: &str, page_request: PageRequest) -> Result<Page<Artist>>;

    /// Artists of a library whose name contains `search_query`
    async fn search(
        &self,
        library_id: &str,
        search_query: &str,
        page_request: PageRequest,
    ) -> Result<Page<Artist>>;

    /// Count artists in a library
    async fn count(&self, library_id: &str) -> Result<i64>;
}

/// SQLite implementation of ArtistRepository
pub struct SqliteArtistRepository {
    pool: SqlitePool,
}

impl SqliteArtistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert `artist`, appending `conflict` to the statement. Returns the
    /// number of rows written.
    async fn insert_row(&self, artist: &Artist, conflict: &str) -> Result<u64> {
        artist
            .validate()
            .map_err(|e| LibraryError::invalid("Artist", e))?;

        let sql = format!(
            r#"
            INSERT INTO artists (
                id, library_id, name, normalized_name, sort_name, external_id,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            {conflict}
            "#
        );
        let result = query(&sql)
            .bind(&artist.id)
            .bind(&artist.library_id)
            .bind(&artist.name)
            .bind(&artist.normalized_name)
            .bind(&artist.sort_name)
            .bind(&artist.external_id)
            .bind(artist.created_at)
            .bind(artist.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ArtistRepository for SqliteArtistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>> {
        let artist = query_as::<_, Artist>("SELECT * FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(artist)
    }

    async fn find_by_name(&self, library_id: &str, name: &str) -> Result<Option<Artist>> {
        let artist = query_as::<_, Artist>(
            r#"
            SELECT * FROM artists
            WHERE library_id = ? AND normalized_name = ?
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(library_id)
        .bind(normalize(name))
        .fetch_optional(&self.pool)
        .await?;

        Ok(artist)
    }

    async fn find_or_create(&self, library_id: &str, name: &str) -> Result<(Artist, bool)> {
        if let Some(existing) = self.find_by_name(library_id, name).await? {
            return Ok((existing, false));
        }

        let artist = Artist::new(library_id.to_string(), name.trim().to_string());
        let written = self
            .insert_row(&artist, "ON CONFLICT(library_id, normalized_name) DO NOTHING")
            .await?;
        if written == 0 {
            // Another writer created it between the lookup and the insert.
            let existing = self
                .find_by_name(library_id, name)
                .await?
                .ok_or_else(|| LibraryError::not_found("Artist", name))?;
            return Ok((existing, false));
        }
        debug!(artist_id = %artist.id, name = %artist.name, "Created artist");

        Ok((artist, true))
    }

    async fn insert(&self, artist: &Artist) -> Result<()> {
        self.insert_row(artist, "").await?;
        Ok(())
    }

    async fn update(&self, artist: &Artist) -> Result<()> {
        artist
            .validate()
            .map_err(|e| LibraryError::invalid("Artist", e))?;

        let result = query(
            r#"
            UPDATE artists
            SET name = ?, normalized_name = ?, sort_name = ?, external_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&artist.name)
        .bind(&artist.normalized_name)
        .bind(&artist.sort_name)
        .bind(&artist.external_id)
        .bind(artist.updated_at)
        .bind(&artist.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Artist", &artist.id));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = query("DELETE FROM artists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, library_id: &str, page_request: PageRequest) -> Result<Page<Artist>> {
        let total = self.count(library_id).await?;

        let artists = query_as::<_, Artist>(
            r#"
            SELECT * FROM artists
            WHERE library_id = ?
            ORDER BY COALESCE(sort_name, name) COLLATE NOCASE ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(library_id)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(artists, total as u64, page_request))
    }

    async fn search(
        &self,
        library_id: &str,
        search_query: &str,
        page_request: PageRequest,
    ) -> Result<Page<Artist>> {
        let pattern = contains_pattern(search_query);

        let total: i64 = query_as(
            "SELECT COUNT(*) FROM artists WHERE library_id = ? AND normalized_name LIKE ? ESCAPE '\\'",
        )
        .bind(library_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map(|row: (i64,)| row.0)?;

        let artists = query_as::<_, Artist>(
            r#"
            SELECT * FROM artists
            WHERE library_id = ? AND normalized_name LIKE ? ESCAPE '\'
            ORDER BY normalized_name ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(library_id)
        .bind(&pattern)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(artists, total as u64, page_request))
    }

    async fn count(&self, library_id: &str) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM artists WHERE library_id = ?")
            .bind(library_id)
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}

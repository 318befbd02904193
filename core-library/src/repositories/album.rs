//! Album repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{normalize, Album};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, Executor, Sqlite, SqlitePool};
use tracing::debug;

/// Album repository interface for data access operations
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// Find an album by its ID, `Ok(None)` when absent
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>>;

    /// Find an artist's album by title, ignoring case and surrounding whitespace
    async fn find_by_title(&self, artist_id: &str, title: &str) -> Result<Option<Album>>;

    /// Return the artist's album with this title, creating it if needed
    ///
    /// `year` is only used when the album is created. Concurrent callers get
    /// the same album. The flag is `true` when the album was created by this
    /// call.
    async fn find_or_create(
        &self,
        artist_id: &str,
        title: &str,
        year: Option<i32>,
    ) -> Result<(Album, bool)>;

    /// Insert a new album
    async fn insert(&self, album: &Album) -> Result<()>;

    /// Update title, sort title and year of an existing album
    ///
    /// The cached aggregates are owned by [`AlbumRepository::refresh_aggregates`]
    /// and are not written here.
    async fn update(&self, album: &Album) -> Result<()>;

    /// Delete an album and its tracks
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Albums of one artist ordered by year, then title
    async fn query_by_artist(&self, artist_id: &str, page_request: PageRequest)
        -> Result<Page<Album>>;

    /// Albums across a whole library ordered by title
    async fn query_by_library(
        &self,
        library_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Album>>;

    /// Recompute `track_count` and `total_duration_ms` from the album's tracks
    async fn refresh_aggregates(&self, album_id: &str) -> Result<Album>;
}

/// Recompute cached album aggregates on any executor (pool or transaction).
pub(crate) async fn refresh_album_aggregates<'e, E>(executor: E, album_id: &str) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = query(
        r#"
        UPDATE albums
        SET track_count = (SELECT COUNT(*) FROM tracks WHERE album_id = ?),
            total_duration_ms = (SELECT COALESCE(SUM(duration_ms), 0) FROM tracks WHERE album_id = ?),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(album_id)
    .bind(album_id)
    .bind(chrono::Utc::now().timestamp())
    .bind(album_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// SQLite implementation of AlbumRepository
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_row(&self, album: &Album, conflict: &str) -> Result<u64> {
        album
            .validate()
            .map_err(|e| LibraryError::invalid("Album", e))?;

        let sql = format!(
            r#"
            INSERT INTO albums (
                id, artist_id, title, normalized_title, sort_title, year,
                track_count, total_duration_ms, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            {conflict}
            "#
        );
        let result = query(&sql)
            .bind(&album.id)
            .bind(&album.artist_id)
            .bind(&album.title)
            .bind(&album.normalized_title)
            .bind(&album.sort_title)
            .bind(album.year)
            .bind(album.track_count)
            .bind(album.total_duration_ms)
            .bind(album.created_at)
            .bind(album.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>> {
        let album = query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(album)
    }

    async fn find_by_title(&self, artist_id: &str, title: &str) -> Result<Option<Album>> {
        let album = query_as::<_, Album>(
            r#"
            SELECT * FROM albums
            WHERE artist_id = ? AND normalized_title = ?
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(artist_id)
        .bind(normalize(title))
        .fetch_optional(&self.pool)
        .await?;

        Ok(album)
    }

    async fn find_or_create(
        &self,
        artist_id: &str,
        title: &str,
        year: Option<i32>,
    ) -> Result<(Album, bool)> {
        if let Some(existing) = self.find_by_title(artist_id, title).await? {
            return Ok((existing, false));
        }

        let mut album = Album::new(artist_id.to_string(), title.trim().to_string());
        album.year = year;
        let written = self
            .insert_row(&album, "ON CONFLICT(artist_id, normalized_title) DO NOTHING")
            .await?;
        if written == 0 {
            let existing = self
                .find_by_title(artist_id, title)
                .await?
                .ok_or_else(|| LibraryError::not_found("Album", title))?;
            return Ok((existing, false));
        }
        debug!(album_id = %album.id, title = %album.title, "Created album");

        Ok((album, true))
    }

    async fn insert(&self, album: &Album) -> Result<()> {
        self.insert_row(album, "").await?;
        Ok(())
    }

    async fn update(&self, album: &Album) -> Result<()> {
        album
            .validate()
            .map_err(|e| LibraryError::invalid("Album", e))?;

        let result = query(
            r#"
            UPDATE albums
            SET title = ?, normalized_title = ?, sort_title = ?, year = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&album.title)
        .bind(&album.normalized_title)
        .bind(&album.sort_title)
        .bind(album.year)
        .bind(chrono::Utc::now().timestamp())
        .bind(&album.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Album", &album.id));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = query("DELETE FROM albums WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_by_artist(
        &self,
        artist_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Album>> {
        let total: i64 = query_as("SELECT COUNT(*) FROM albums WHERE artist_id = ?")
            .bind(artist_id)
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        let albums = query_as::<_, Album>(
            r#"
            SELECT * FROM albums
            WHERE artist_id = ?
            ORDER BY year IS NULL, year ASC, COALESCE(sort_title, title) COLLATE NOCASE ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(artist_id)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(albums, total as u64, page_request))
    }

    async fn query_by_library(
        &self,
        library_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Album>> {
        let total: i64 = query_as(
            r#"
            SELECT COUNT(*) FROM albums al
            INNER JOIN artists ar ON ar.id = al.artist_id
            WHERE ar.library_id = ?
            "#,
        )
        .bind(library_id)
        .fetch_one(&self.pool)
        .await
        .map(|row: (i64,)| row.0)?;

        let albums = query_as::<_, Album>(
            r#"
            SELECT al.* FROM albums al
            INNER JOIN artists ar ON ar.id = al.artist_id
            WHERE ar.library_id = ?
            ORDER BY COALESCE(al.sort_title, al.title) COLLATE NOCASE ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(library_id)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(albums, total as u64, page_request))
    }

    async fn refresh_aggregates(&self, album_id: &str) -> Result<Album> {
        if refresh_album_aggregates(&self.pool, album_id).await? == 0 {
            return Err(LibraryError::not_found("Album", album_id));
        }

        self.find_by_id(album_id)
            .await?
            .ok_or_else(|| LibraryError::not_found("Album", album_id))
    }
}

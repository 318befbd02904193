//! Track repository trait and implementation
//!
//! Every write that can change an album's membership or durations also
//! recomputes that album's cached aggregates inside the same transaction.

use crate::error::{LibraryError, Result};
use crate::models::Track;
use crate::repositories::album::refresh_album_aggregates;
use crate::repositories::{contains_pattern, Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, Executor, Sqlite, SqlitePool};
use tracing::{debug, instrument};

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track by its ID
    ///
    /// # Returns
    /// - `Ok(Some(track))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>>;

    /// Find a library's track by its file path
    ///
    /// Paths are unique per library; two libraries over the same folder hold
    /// separate tracks.
    async fn find_by_path(&self, library_id: &str, file_path: &str) -> Result<Option<Track>>;

    /// Insert a new track
    ///
    /// # Errors
    /// Returns error if:
    /// - Track with the same ID, or the same file path in the album's library, already exists
    /// - Track validation fails
    /// - Album doesn't exist (`NotFound`)
    async fn insert(&self, track: &Track) -> Result<()>;

    /// Update an existing track
    ///
    /// Play history is not written here; see [`TrackRepository::record_play`].
    ///
    /// # Errors
    /// Returns `NotFound` if the track does not exist
    async fn update(&self, track: &Track) -> Result<()>;

    /// Insert or refresh the track stored under the same file path in the
    /// album's library
    ///
    /// An existing row keeps its ID, play history and creation time. Returns
    /// the stored track and `true` when it was newly created.
    async fn upsert(&self, track: &Track) -> Result<(Track, bool)>;

    /// Delete a track by ID
    ///
    /// Playlist items referencing it are removed by cascade, and the
    /// remaining items of each affected playlist are renumbered.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Tracks of one album ordered by disc and track number
    async fn query_by_album(&self, album_id: &str, page_request: PageRequest)
        -> Result<Page<Track>>;

    /// Tracks of a whole library ordered by artist, album, disc and track number
    async fn query_by_library(
        &self,
        library_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>>;

    /// Tracks whose title, artist or album contains `search_query`
    async fn search(
        &self,
        library_id: &str,
        search_query: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>>;

    /// Increment the play count and stamp `last_played_at`
    async fn record_play(&self, id: &str, at: i64) -> Result<Track>;

    /// Count tracks in a library
    async fn count(&self, library_id: &str) -> Result<i64>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const LIBRARY_JOIN: &str = r#"
    FROM tracks t
    INNER JOIN albums al ON al.id = t.album_id
    INNER JOIN artists ar ON ar.id = al.artist_id
"#;

/// Library owning `album_id`, through its artist.
async fn album_library<'e, E>(executor: E, album_id: &str) -> Result<String>
where
    E: Executor<'e, Database = Sqlite>,
{
    let library: Option<(String,)> = query_as(
        r#"
        SELECT ar.library_id FROM albums al
        INNER JOIN artists ar ON ar.id = al.artist_id
        WHERE al.id = ?
        "#,
    )
    .bind(album_id)
    .fetch_optional(executor)
    .await?;

    library
        .map(|(library_id,)| library_id)
        .ok_or_else(|| LibraryError::not_found("Album", album_id))
}

async fn insert_row<'e, E>(executor: E, track: &Track, library_id: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    query(
        r#"
        INSERT INTO tracks (
            id, library_id, album_id, title, normalized_title, track_number, disc_number, genre,
            file_path, duration_ms, format, bitrate, sample_rate, channels, file_size,
            play_count, last_played_at, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&track.id)
    .bind(library_id)
    .bind(&track.album_id)
    .bind(&track.title)
    .bind(&track.normalized_title)
    .bind(track.track_number)
    .bind(track.disc_number)
    .bind(&track.genre)
    .bind(&track.file_path)
    .bind(track.duration_ms)
    .bind(&track.format)
    .bind(track.bitrate)
    .bind(track.sample_rate)
    .bind(track.channels)
    .bind(track.file_size)
    .bind(track.play_count)
    .bind(track.last_played_at)
    .bind(track.created_at)
    .bind(track.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn update_row<'e, E>(executor: E, track: &Track, library_id: &str) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = query(
        r#"
        UPDATE tracks
        SET library_id = ?, album_id = ?, title = ?, normalized_title = ?, track_number = ?,
            disc_number = ?, genre = ?, file_path = ?, duration_ms = ?, format = ?,
            bitrate = ?, sample_rate = ?, channels = ?, file_size = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(library_id)
    .bind(&track.album_id)
    .bind(&track.title)
    .bind(&track.normalized_title)
    .bind(track.track_number)
    .bind(track.disc_number)
    .bind(&track.genre)
    .bind(&track.file_path)
    .bind(track.duration_ms)
    .bind(&track.format)
    .bind(track.bitrate)
    .bind(track.sample_rate)
    .bind(track.channels)
    .bind(track.file_size)
    .bind(chrono::Utc::now().timestamp())
    .bind(&track.id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

fn validate(track: &Track) -> Result<()> {
    track
        .validate()
        .map_err(|e| LibraryError::invalid("Track", e))
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn find_by_path(&self, library_id: &str, file_path: &str) -> Result<Option<Track>> {
        let track =
            query_as::<_, Track>("SELECT * FROM tracks WHERE library_id = ? AND file_path = ?")
                .bind(library_id)
                .bind(file_path)
                .fetch_optional(&self.pool)
                .await?;

        Ok(track)
    }

    async fn insert(&self, track: &Track) -> Result<()> {
        validate(track)?;

        let mut tx = self.pool.begin().await?;
        let library_id = album_library(&mut *tx, &track.album_id).await?;
        insert_row(&mut *tx, track, &library_id).await?;
        refresh_album_aggregates(&mut *tx, &track.album_id).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn update(&self, track: &Track) -> Result<()> {
        validate(track)?;

        let mut tx = self.pool.begin().await?;
        let previous_album: Option<(String,)> =
            query_as("SELECT album_id FROM tracks WHERE id = ?")
                .bind(&track.id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((previous_album,)) = previous_album else {
            return Err(LibraryError::not_found("Track", &track.id));
        };

        let library_id = album_library(&mut *tx, &track.album_id).await?;
        update_row(&mut *tx, track, &library_id).await?;
        refresh_album_aggregates(&mut *tx, &track.album_id).await?;
        if previous_album != track.album_id {
            refresh_album_aggregates(&mut *tx, &previous_album).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self, track), fields(path = %track.file_path))]
    async fn upsert(&self, track: &Track) -> Result<(Track, bool)> {
        validate(track)?;

        let mut tx = self.pool.begin().await?;
        let library_id = album_library(&mut *tx, &track.album_id).await?;
        let existing =
            query_as::<_, Track>("SELECT * FROM tracks WHERE library_id = ? AND file_path = ?")
                .bind(&library_id)
                .bind(&track.file_path)
                .fetch_optional(&mut *tx)
                .await?;

        let (stored, created) = match existing {
            Some(existing) => {
                let merged = Track {
                    id: existing.id.clone(),
                    play_count: existing.play_count,
                    last_played_at: existing.last_played_at,
                    created_at: existing.created_at,
                    ..track.clone()
                };
                update_row(&mut *tx, &merged, &library_id).await?;
                if existing.album_id != merged.album_id {
                    refresh_album_aggregates(&mut *tx, &existing.album_id).await?;
                }
                debug!(track_id = %merged.id, "Refreshed existing track");
                (merged, false)
            }
            None => {
                insert_row(&mut *tx, track, &library_id).await?;
                debug!(track_id = %track.id, "Inserted track");
                (track.clone(), true)
            }
        };
        refresh_album_aggregates(&mut *tx, &stored.album_id).await?;
        tx.commit().await?;

        Ok((stored, created))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let album: Option<(String,)> = query_as("SELECT album_id FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((album_id,)) = album else {
            return Ok(false);
        };

        query("DELETE FROM tracks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        refresh_album_aggregates(&mut *tx, &album_id).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn query_by_album(
        &self,
        album_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        let total: i64 = query_as("SELECT COUNT(*) FROM tracks WHERE album_id = ?")
            .bind(album_id)
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        let tracks = query_as::<_, Track>(
            r#"
            SELECT * FROM tracks
            WHERE album_id = ?
            ORDER BY COALESCE(disc_number, 1), track_number IS NULL, track_number, normalized_title
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(album_id)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(tracks, total as u64, page_request))
    }

    async fn query_by_library(
        &self,
        library_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        let total = self.count(library_id).await?;

        let sql = format!(
            r#"
            SELECT t.* {LIBRARY_JOIN}
            WHERE ar.library_id = ?
            ORDER BY COALESCE(ar.sort_name, ar.name) COLLATE NOCASE,
                     COALESCE(al.sort_title, al.title) COLLATE NOCASE,
                     COALESCE(t.disc_number, 1), t.track_number IS NULL, t.track_number,
                     t.normalized_title
            LIMIT ? OFFSET ?
            "#
        );
        let tracks = query_as::<_, Track>(&sql)
            .bind(library_id)
            .bind(page_request.limit())
            .bind(page_request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(tracks, total as u64, page_request))
    }

    async fn search(
        &self,
        library_id: &str,
        search_query: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        let pattern = contains_pattern(search_query);
        let filter = r#"
            WHERE ar.library_id = ?
              AND (t.normalized_title LIKE ? ESCAPE '\'
                   OR ar.normalized_name LIKE ? ESCAPE '\'
                   OR al.normalized_title LIKE ? ESCAPE '\')
        "#;

        let count_sql = format!("SELECT COUNT(*) {LIBRARY_JOIN} {filter}");
        let total: i64 = query_as(&count_sql)
            .bind(library_id)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        let sql = format!(
            "SELECT t.* {LIBRARY_JOIN} {filter} ORDER BY t.normalized_title LIMIT ? OFFSET ?"
        );
        let tracks = query_as::<_, Track>(&sql)
            .bind(library_id)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(page_request.limit())
            .bind(page_request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(tracks, total as u64, page_request))
    }

    async fn record_play(&self, id: &str, at: i64) -> Result<Track> {
        let result = query(
            "UPDATE tracks SET play_count = play_count + 1, last_played_at = ? WHERE id = ?",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Track", id));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::not_found("Track", id))
    }

    async fn count(&self, library_id: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) {LIBRARY_JOIN} WHERE ar.library_id = ?");
        let count: i64 = query_as(&sql)
            .bind(library_id)
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{fixture, track};
    use crate::repositories::{AlbumRepository, SqliteAlbumRepository};

    #[tokio::test]
    async fn test_insert_refreshes_album_aggregates() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());
        let albums = SqliteAlbumRepository::new(fx.pool.clone());

        repo.insert(&track(&fx.album.id, "Intro", 30_000)).await.unwrap();
        repo.insert(&track(&fx.album.id, "Outro", 45_000)).await.unwrap();

        let album = albums.find_by_id(&fx.album.id).await.unwrap().unwrap();
        assert_eq!(album.track_count, 2);
        assert_eq!(album.total_duration_ms, 75_000);
    }

    #[tokio::test]
    async fn test_find_by_path() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());

        let t = track(&fx.album.id, "So What", 562_000);
        repo.insert(&t).await.unwrap();

        let found = repo
            .find_by_path(&fx.library.id, "/music/So_What.flac")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, t);
        assert!(repo
            .find_by_path(&fx.library.id, "/music/none.flac")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_by_path("other-library", "/music/So_What.flac")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_path_rejected_on_insert() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());

        repo.insert(&track(&fx.album.id, "Same", 1_000)).await.unwrap();
        let err = repo
            .insert(&track(&fx.album.id, "Same", 2_000))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::Database(_)));
    }

    #[tokio::test]
    async fn test_upsert_keeps_identity_and_history() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());

        let original = track(&fx.album.id, "Blue", 100_000);
        let (stored, created) = repo.upsert(&original).await.unwrap();
        assert!(created);
        assert_eq!(stored.id, original.id);

        repo.record_play(&original.id, 1_700_000_000).await.unwrap();

        let mut rescanned = track(&fx.album.id, "Blue", 101_000);
        rescanned.genre = Some("Jazz".to_string());
        let (stored, created) = repo.upsert(&rescanned).await.unwrap();
        assert!(!created);
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.play_count, 1);

        let found = repo.find_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(found.duration_ms, 101_000);
        assert_eq!(found.genre.as_deref(), Some("Jazz"));
        assert_eq!(found.last_played_at, Some(1_700_000_000));
        assert_eq!(repo.count(&fx.library.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_moves_track_between_albums() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());
        let albums = SqliteAlbumRepository::new(fx.pool.clone());

        let (other, _) = albums
            .find_or_create(&fx.artist.id, "Other", None)
            .await
            .unwrap();
        let mut t = track(&fx.album.id, "Wanderer", 10_000);
        repo.insert(&t).await.unwrap();

        t.album_id = other.id.clone();
        repo.update(&t).await.unwrap();

        let before = albums.find_by_id(&fx.album.id).await.unwrap().unwrap();
        let after = albums.find_by_id(&other.id).await.unwrap().unwrap();
        assert_eq!((before.track_count, before.total_duration_ms), (0, 0));
        assert_eq!((after.track_count, after.total_duration_ms), (1, 10_000));
    }

    #[tokio::test]
    async fn test_update_missing_track_is_not_found() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());
        let err = repo
            .update(&track(&fx.album.id, "Ghost", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_refreshes_aggregates() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());
        let albums = SqliteAlbumRepository::new(fx.pool.clone());

        let t = track(&fx.album.id, "Gone", 5_000);
        repo.insert(&t).await.unwrap();
        assert!(repo.delete(&t.id).await.unwrap());
        assert!(!repo.delete(&t.id).await.unwrap());

        let album = albums.find_by_id(&fx.album.id).await.unwrap().unwrap();
        assert_eq!(album.track_count, 0);
        assert_eq!(album.total_duration_ms, 0);
    }

    #[tokio::test]
    async fn test_query_by_album_orders_by_track_number() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());

        for (title, number) in [("Third", 3), ("First", 1), ("Second", 2)] {
            let mut t = track(&fx.album.id, title, 1_000);
            t.track_number = Some(number);
            repo.insert(&t).await.unwrap();
        }

        let page = repo
            .query_by_album(&fx.album.id, PageRequest::default())
            .await
            .unwrap();
        let titles: Vec<&str> = page.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);

        let library = repo
            .query_by_library(&fx.library.id, PageRequest::new(0, 2))
            .await
            .unwrap();
        assert_eq!(library.total, 3);
        assert_eq!(library.items.len(), 2);
        assert!(library.has_next());
    }

    #[tokio::test]
    async fn test_search_matches_title_artist_and_album() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());

        repo.insert(&track(&fx.album.id, "Naima", 1_000)).await.unwrap();
        repo.insert(&track(&fx.album.id, "Giant Steps", 1_000))
            .await
            .unwrap();

        let by_title = repo
            .search(&fx.library.id, "naim", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_title.total, 1);
        assert_eq!(by_title.items[0].title, "Naima");

        let by_artist = repo
            .search(&fx.library.id, "fixture artist", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_artist.total, 2);

        let none = repo
            .search(&fx.library.id, "%", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn test_record_play() {
        let fx = fixture().await;
        let repo = SqliteTrackRepository::new(fx.pool.clone());

        let t = track(&fx.album.id, "Loop", 1_000);
        repo.insert(&t).await.unwrap();

        repo.record_play(&t.id, 100).await.unwrap();
        let played = repo.record_play(&t.id, 200).await.unwrap();
        assert_eq!(played.play_count, 2);
        assert_eq!(played.last_played_at, Some(200));

        let err = repo.record_play("missing", 1).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }
}

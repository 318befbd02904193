//! Library repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Library;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Library repository interface for data access operations
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Find a library by ID, `Ok(None)` when absent
    async fn find_by_id(&self, id: &str) -> Result<Option<Library>>;

    /// All libraries owned by a user, ordered by name
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Library>>;

    /// Insert a new library
    async fn insert(&self, library: &Library) -> Result<()>;

    /// Update name and path of an existing library
    ///
    /// # Errors
    /// Returns `NotFound` if no row has the library's ID
    async fn update(&self, library: &Library) -> Result<()>;

    /// Delete a library together with its artists, albums, tracks and playlists
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Stamp `last_scanned_at` after a completed scan
    async fn mark_scanned(&self, id: &str, at: i64) -> Result<()>;

    /// Count total libraries
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of LibraryRepository
pub struct SqliteLibraryRepository {
    pool: SqlitePool,
}

impl SqliteLibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LibraryRepository for SqliteLibraryRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Library>> {
        let library = query_as::<_, Library>("SELECT * FROM libraries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(library)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Library>> {
        let libraries =
            query_as::<_, Library>("SELECT * FROM libraries WHERE user_id = ? ORDER BY name ASC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(libraries)
    }

    async fn insert(&self, library: &Library) -> Result<()> {
        library
            .validate()
            .map_err(|e| LibraryError::invalid("Library", e))?;

        query(
            r#"
            INSERT INTO libraries (id, user_id, name, path, last_scanned_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&library.id)
        .bind(&library.user_id)
        .bind(&library.name)
        .bind(&library.path)
        .bind(library.last_scanned_at)
        .bind(library.created_at)
        .bind(library.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, library: &Library) -> Result<()> {
        library
            .validate()
            .map_err(|e| LibraryError::invalid("Library", e))?;

        let result = query("UPDATE libraries SET name = ?, path = ?, updated_at = ? WHERE id = ?")
            .bind(&library.name)
            .bind(&library.path)
            .bind(chrono::Utc::now().timestamp())
            .bind(&library.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Library", &library.id));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = query("DELETE FROM libraries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_scanned(&self, id: &str, at: i64) -> Result<()> {
        let result =
            query("UPDATE libraries SET last_scanned_at = ?, updated_at = ? WHERE id = ?")
                .bind(at)
                .bind(at)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("Library", id));
        }

        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM libraries")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::fixture;

    #[tokio::test]
    async fn test_insert_and_find_by_user() {
        let fx = fixture().await;
        let repo = SqliteLibraryRepository::new(fx.pool.clone());

        let second = Library::new(fx.user.id.clone(), "Archive".to_string(), "/archive".to_string());
        repo.insert(&second).await.unwrap();

        let libraries = repo.find_by_user(&fx.user.id).await.unwrap();
        let names: Vec<&str> = libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Archive", "Main"]);
    }

    #[tokio::test]
    async fn test_insert_requires_existing_user() {
        let fx = fixture().await;
        let repo = SqliteLibraryRepository::new(fx.pool.clone());

        let orphan = Library::new("missing-user".to_string(), "Lost".to_string(), "/x".to_string());
        let err = repo.insert(&orphan).await.unwrap_err();
        assert!(matches!(err, LibraryError::Database(_)));
    }

    #[tokio::test]
    async fn test_mark_scanned() {
        let fx = fixture().await;
        let repo = SqliteLibraryRepository::new(fx.pool.clone());

        repo.mark_scanned(&fx.library.id, 1_700_000_123).await.unwrap();
        let found = repo.find_by_id(&fx.library.id).await.unwrap().unwrap();
        assert_eq!(found.last_scanned_at, Some(1_700_000_123));

        let err = repo.mark_scanned("missing", 1).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_and_reject_empty_path() {
        let fx = fixture().await;
        let repo = SqliteLibraryRepository::new(fx.pool.clone());

        let mut library = fx.library.clone();
        library.name = "Renamed".to_string();
        repo.update(&library).await.unwrap();
        assert_eq!(
            repo.find_by_id(&library.id).await.unwrap().unwrap().name,
            "Renamed"
        );

        library.path = " ".to_string();
        assert!(matches!(
            repo.update(&library).await,
            Err(LibraryError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_artists() {
        let fx = fixture().await;
        let repo = SqliteLibraryRepository::new(fx.pool.clone());

        assert!(repo.delete(&fx.library.id).await.unwrap());

        let (artists,): (i64,) = query_as("SELECT COUNT(*) FROM artists")
            .fetch_one(&fx.pool)
            .await
            .unwrap();
        assert_eq!(artists, 0);
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}

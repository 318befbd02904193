//! User repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::User;
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// User repository interface for data access operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID, `Ok(None)` when absent
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Find a user by username (case-insensitive)
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Insert a new user
    ///
    /// # Errors
    /// Returns error if validation fails or the ID already exists
    async fn insert(&self, user: &User) -> Result<()>;

    /// Update an existing user
    ///
    /// # Errors
    /// Returns `NotFound` if no row has the user's ID
    async fn update(&self, user: &User) -> Result<()>;

    /// Delete a user and, by cascade, everything they own
    ///
    /// # Returns
    /// - `Ok(true)` if the user was deleted
    /// - `Ok(false)` if the user was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Stamp `last_login_at`
    async fn record_login(&self, id: &str, at: i64) -> Result<()>;

    /// Query users ordered by username
    async fn query(&self, page_request: PageRequest) -> Result<Page<User>>;

    /// Count total users
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = query_as::<_, User>(
            "SELECT * FROM users WHERE lower(username) = ? ORDER BY created_at LIMIT 1",
        )
        .bind(crate::models::normalize(username))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert(&self, user: &User) -> Result<()> {
        user.validate()
            .map_err(|e| LibraryError::invalid("User", e))?;

        query(
            r#"
            INSERT INTO users (id, username, email, is_active, last_login_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, user: &User) -> Result<()> {
        user.validate()
            .map_err(|e| LibraryError::invalid("User", e))?;

        let result = query(
            r#"
            UPDATE users
            SET username = ?, email = ?, is_active = ?, last_login_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(chrono::Utc::now().timestamp())
        .bind(&user.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("User", &user.id));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: &str, at: i64) -> Result<()> {
        let result = query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("User", id));
        }

        Ok(())
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<User>> {
        let total = self.count().await?;

        let users = query_as::<_, User>("SELECT * FROM users ORDER BY username ASC LIMIT ? OFFSET ?")
            .bind(page_request.limit())
            .bind(page_request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(users, total as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}

use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the service indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub hashed_password: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookRow {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub year: Option<i64>,
    pub description: Option<String>,
    pub created_at: String,
    pub owner_id: i64,
}

/// Listing window and filters for a user's catalog.
///
/// `author` / `title` are case-insensitive substring matches applied in SQL.
/// `limit = -1` means no limit (SQLite semantics), used by the profile view.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub author: Option<String>,
    pub title: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

impl BookFilter {
    pub fn all() -> Self {
        Self {
            skip: 0,
            limit: -1,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("books.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ─── Users ──────────────────────────────────────────────────────────────

    pub async fn create_user(
        &self,
        username: &str,
        hashed_password: &str,
        email: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<UserRow> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (username, hashed_password, email, full_name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(hashed_password)
        .bind(email)
        .bind(full_name)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_user(result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow::anyhow!("user not found after insert"))
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Write the merged profile fields back. The caller resolves which fields
    /// changed; this always writes all three columns.
    pub async fn update_user_profile(
        &self,
        id: i64,
        email: Option<&str>,
        full_name: Option<&str>,
        hashed_password: &str,
    ) -> Result<UserRow> {
        sqlx::query("UPDATE users SET email = ?, full_name = ?, hashed_password = ? WHERE id = ?")
            .bind(email)
            .bind(full_name)
            .bind(hashed_password)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.get_user(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user not found after update"))
    }

    // ─── Books ──────────────────────────────────────────────────────────────

    pub async fn create_book(
        &self,
        owner_id: i64,
        title: &str,
        author: &str,
        year: Option<i64>,
        description: Option<&str>,
    ) -> Result<BookRow> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO books (title, author, year, description, created_at, owner_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(author)
        .bind(year)
        .bind(description)
        .bind(&now)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        self.get_book(owner_id, result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow::anyhow!("book not found after insert"))
    }

    /// Fetch a single book, scoped to its owner. Another user's book id
    /// resolves to `None`, same as an id that never existed.
    pub async fn get_book(&self, owner_id: i64, book_id: i64) -> Result<Option<BookRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM books WHERE id = ? AND owner_id = ?")
                .bind(book_id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// List a user's books, newest first.
    ///
    /// The LIKE patterns inherit SQLite's ASCII case-insensitivity; a literal
    /// `%` in a filter acts as a wildcard.
    pub async fn list_books(&self, owner_id: i64, filter: &BookFilter) -> Result<Vec<BookRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM books
                 WHERE owner_id = ?
                   AND (? IS NULL OR author LIKE '%' || ? || '%')
                   AND (? IS NULL OR title LIKE '%' || ? || '%')
                 ORDER BY created_at DESC, id DESC
                 LIMIT ? OFFSET ?",
            )
            .bind(owner_id)
            .bind(&filter.author)
            .bind(&filter.author)
            .bind(&filter.title)
            .bind(&filter.title)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    /// Replace every mutable field of a book. Returns `None` when the id does
    /// not exist or belongs to a different user.
    pub async fn update_book(
        &self,
        owner_id: i64,
        book_id: i64,
        title: &str,
        author: &str,
        year: Option<i64>,
        description: Option<&str>,
    ) -> Result<Option<BookRow>> {
        let result = sqlx::query(
            "UPDATE books SET title = ?, author = ?, year = ?, description = ?
             WHERE id = ? AND owner_id = ?",
        )
        .bind(title)
        .bind(author)
        .bind(year)
        .bind(description)
        .bind(book_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_book(owner_id, book_id).await
    }

    /// Returns `true` when a row was deleted, `false` when the id does not
    /// exist or belongs to a different user.
    pub async fn delete_book(&self, owner_id: i64, book_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = ? AND owner_id = ?")
            .bind(book_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

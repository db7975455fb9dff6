//! Typed record repository over named collections.
//!
//! Every collection shares one table; a record is its JSON body keyed by
//! `(collection, id)`. Listing preserves insertion order, and rewriting a
//! record never moves it.

use std::path::Path;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;

/// Fixed collection names in the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Posts,
    Comments,
    UserProfiles,
    JournalEntries,
    /// The client's persisted session token
    Session,
    Users,
    Accounts,
    Tokens,
    ExternalSessions,
    Kindness,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Comments => "comments",
            Collection::UserProfiles => "userProfiles",
            Collection::JournalEntries => "journalEntries",
            Collection::Session => "session",
            Collection::Users => "users",
            Collection::Accounts => "accounts",
            Collection::Tokens => "tokens",
            Collection::ExternalSessions => "externalSessions",
            Collection::Kindness => "kindness",
        }
    }
}

/// A value stored in exactly one collection under a string id.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Unpin {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// Repository over the embedded store.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the store at `path`.
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        let pool = super::init_database(path).await?;
        Ok(Self::new(pool))
    }

    /// Get a record by id.
    pub async fn get<R: Record>(&self, id: &str) -> Result<Option<R>, AppError> {
        let row = sqlx::query("SELECT body FROM records WHERE collection = ? AND id = ?")
            .bind(R::COLLECTION.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode::<R>(&row)).transpose()
    }

    /// List matching records, oldest first.
    pub async fn list<R, P>(&self, predicate: P) -> Result<Vec<R>, AppError>
    where
        R: Record,
        P: Fn(&R) -> bool + Send,
    {
        self.list_ordered("ASC", predicate).await
    }

    /// List matching records, newest first.
    pub async fn list_recent<R, P>(&self, predicate: P) -> Result<Vec<R>, AppError>
    where
        R: Record,
        P: Fn(&R) -> bool + Send,
    {
        self.list_ordered("DESC", predicate).await
    }

    async fn list_ordered<R, P>(&self, direction: &str, predicate: P) -> Result<Vec<R>, AppError>
    where
        R: Record,
        P: Fn(&R) -> bool + Send,
    {
        let sql = format!(
            "SELECT body FROM records WHERE collection = ? ORDER BY seq {}",
            direction
        );
        let rows = sqlx::query(&sql)
            .bind(R::COLLECTION.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = decode::<R>(row)?;
            if predicate(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Number of records in the collection.
    pub async fn count<R: Record>(&self) -> Result<usize, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE collection = ?")
            .bind(R::COLLECTION.as_str())
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }

    /// Insert or replace a record. A replaced record keeps its position.
    pub async fn put<R: Record>(&self, record: &R) -> Result<(), AppError> {
        let body = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO records (collection, id, body, updated_at) VALUES (?, ?, ?, ?)
               ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at"#,
        )
        .bind(R::COLLECTION.as_str())
        .bind(record.id())
        .bind(&body)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a record unless one with the same id exists. Returns whether
    /// the record was written.
    pub async fn insert<R: Record>(&self, record: &R) -> Result<bool, AppError> {
        let body = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"INSERT INTO records (collection, id, body, updated_at) VALUES (?, ?, ?, ?)
               ON CONFLICT (collection, id) DO NOTHING"#,
        )
        .bind(R::COLLECTION.as_str())
        .bind(record.id())
        .bind(&body)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Read-modify-write a record in one transaction.
    ///
    /// Returns `None` when the record does not exist. If `merge` fails the
    /// stored record is left untouched.
    pub async fn update<R, F>(&self, id: &str, merge: F) -> Result<Option<R>, AppError>
    where
        R: Record,
        F: FnOnce(&mut R) -> Result<(), AppError> + Send,
    {
        let collection = R::COLLECTION.as_str();
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading so the read cannot go stale
        let touched = sqlx::query(
            "UPDATE records SET updated_at = ? WHERE collection = ? AND id = ?",
        )
        .bind(&now)
        .bind(collection)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query("SELECT body FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let mut record = decode::<R>(&row)?;
        merge(&mut record)?;
        let body = serde_json::to_string(&record)?;

        sqlx::query("UPDATE records SET body = ? WHERE collection = ? AND id = ?")
            .bind(&body)
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(record))
    }

    /// Delete a record. Returns whether anything was removed.
    pub async fn delete<R: Record>(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(R::COLLECTION.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove and return a record in one step, for one-shot values.
    pub async fn take<R: Record>(&self, id: &str) -> Result<Option<R>, AppError> {
        let row = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ? RETURNING body")
            .bind(R::COLLECTION.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode::<R>(&row)).transpose()
    }
}

fn decode<R: Record>(row: &sqlx::sqlite::SqliteRow) -> Result<R, AppError> {
    let body: String = row.get("body");
    Ok(serde_json::from_str(&body)?)
}

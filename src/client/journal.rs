//! Journal manager. Entries never leave the client store.

use chrono::Utc;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{EntryFilter, JournalEntry, NewJournalEntry};

/// Private journal CRUD, scoped by user.
#[derive(Clone)]
pub struct JournalManager {
    store: Repository,
}

impl JournalManager {
    pub fn new(store: Repository) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        user_id: &str,
        entry: &NewJournalEntry,
    ) -> Result<JournalEntry, AppError> {
        entry.validate()?;

        let stored = JournalEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: entry.title.trim().to_string(),
            content: entry.content.trim().to_string(),
            entry_type: entry.entry_type,
            mood: entry.mood(),
            created_at: Utc::now(),
        };
        self.store.put(&stored).await?;
        tracing::debug!(
            entry_id = %stored.id,
            kind = stored.entry_type.as_str(),
            "Journal entry saved"
        );

        Ok(stored)
    }

    /// Remove an entry by id. Confirmation is the caller's job; this removes
    /// unconditionally. Entries of other users are left alone.
    pub async fn delete(&self, user_id: &str, entry_id: &str) -> Result<bool, AppError> {
        match self.store.get::<JournalEntry>(entry_id).await? {
            Some(entry) if entry.user_id == user_id => {
                self.store.delete::<JournalEntry>(entry_id).await
            }
            _ => Ok(false),
        }
    }

    /// The user's entries matching `filter`, newest first.
    pub async fn list_by_type(
        &self,
        user_id: &str,
        filter: EntryFilter,
    ) -> Result<Vec<JournalEntry>, AppError> {
        let user_id = user_id.to_string();
        self.store
            .list_recent::<JournalEntry, _>(move |e| e.user_id == user_id && filter.matches(e))
            .await
    }
}

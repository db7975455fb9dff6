//! Private journal entries.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Collection, Record};
use crate::errors::AppError;

use super::DEFAULT_MOOD;

/// Kind of journal entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    #[default]
    Daily,
    Reflection,
    Gratitude,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Daily => "daily",
            EntryType::Reflection => "reflection",
            EntryType::Gratitude => "gratitude",
        }
    }
}

impl FromStr for EntryType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(EntryType::Daily),
            "reflection" => Ok(EntryType::Reflection),
            "gratitude" => Ok(EntryType::Gratitude),
            other => Err(AppError::Validation(format!(
                "Unknown entry type: {}",
                other
            ))),
        }
    }
}

/// Tab filter over journal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryFilter {
    #[default]
    All,
    Only(EntryType),
}

impl EntryFilter {
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        match self {
            EntryFilter::All => true,
            EntryFilter::Only(kind) => entry.entry_type == *kind,
        }
    }
}

/// A private journal entry, owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub entry_type: EntryType,
    pub mood: String,
    pub created_at: DateTime<Utc>,
}

impl Record for JournalEntry {
    const COLLECTION: Collection = Collection::JournalEntries;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Fields for a new journal entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub entry_type: EntryType,
    #[serde(default)]
    pub mood: Option<String>,
}

impl NewJournalEntry {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(AppError::Validation(
                "Please fill in all fields".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mood(&self) -> String {
        self.mood
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MOOD.to_string())
    }
}

//! Supportiveness policy applied to comments before they are stored.

use crate::errors::AppError;

/// Message returned with every rejection; clients show it verbatim.
pub const REJECTION_MESSAGE: &str =
    "This comment doesn't feel supportive. Please keep replies kind and encouraging.";

/// Phrases blocked when no explicit list is configured.
pub const DEFAULT_BLOCKED_TERMS: [&str; 8] = [
    "stupid",
    "idiot",
    "loser",
    "pathetic",
    "worthless",
    "shut up",
    "nobody cares",
    "kill yourself",
];

/// Case-insensitive blocked-phrase filter.
#[derive(Debug, Clone)]
pub struct Moderator {
    blocked: Vec<String>,
}

impl Default for Moderator {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_TERMS.iter().map(|t| t.to_string()))
    }
}

impl Moderator {
    pub fn new(terms: impl IntoIterator<Item = String>) -> Self {
        let blocked = terms
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { blocked }
    }

    pub fn check(&self, content: &str) -> Result<(), AppError> {
        let lowered = content.to_lowercase();
        if let Some(term) = self.blocked.iter().find(|t| lowered.contains(t.as_str())) {
            tracing::debug!(term = %term, "comment rejected by moderation");
            return Err(AppError::ModerationRejected(REJECTION_MESSAGE.to_string()));
        }
        Ok(())
    }
}

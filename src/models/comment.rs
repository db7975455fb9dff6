//! Comment model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Collection, Record};
use crate::errors::AppError;

/// Alias shown on every comment.
pub const COMMENT_ALIAS: &str = "Anonymous User";

/// A reply in a post's flat thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub anonymous_id: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Comment {
    const COLLECTION: Collection = Collection::Comments;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Request body for posting a comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub content: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.content.trim().is_empty() {
            return Err(AppError::Validation("Please write a comment".to_string()));
        }
        Ok(())
    }
}

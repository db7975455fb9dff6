//! Post model and feed categories.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Collection, Record};
use crate::errors::AppError;

/// Mood used when a post or journal entry does not pick one.
pub const DEFAULT_MOOD: &str = "😊";

/// Moods offered by the composer.
pub const MOOD_EMOJIS: [&str; 8] = ["😊", "😢", "😰", "😔", "😤", "🤗", "💪", "🌟"];

/// Aliases assigned to posts, independent of the author's identity.
pub const ANONYMOUS_NAMES: [&str; 12] = [
    "Anonymous Butterfly",
    "Anonymous Phoenix",
    "Anonymous Star",
    "Anonymous Ocean",
    "Anonymous Mountain",
    "Anonymous River",
    "Anonymous Cloud",
    "Anonymous Moon",
    "Anonymous Sun",
    "Anonymous Rainbow",
    "Anonymous Tree",
    "Anonymous Breeze",
];

/// Pick a random alias from [`ANONYMOUS_NAMES`].
pub fn random_anonymous_name() -> String {
    use rand::seq::SliceRandom;

    ANONYMOUS_NAMES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(ANONYMOUS_NAMES[0])
        .to_string()
}

/// Fixed set of feed categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Academics,
    Relationships,
    #[serde(rename = "Self-doubt")]
    SelfDoubt,
    Motivation,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Academics,
        Category::Relationships,
        Category::SelfDoubt,
        Category::Motivation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academics => "Academics",
            Category::Relationships => "Relationships",
            Category::SelfDoubt => "Self-doubt",
            Category::Motivation => "Motivation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown category: {}", s)))
    }
}

/// Category constraint on a feed listing. `All` is the unconstrained sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => post.category == *category,
        }
    }

    /// Value for the `category` query parameter, if any.
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(category) => Some(category.as_str()),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "All" {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

impl From<Category> for CategoryFilter {
    fn from(category: Category) -> Self {
        CategoryFilter::Only(category)
    }
}

/// An anonymized, mood-tagged feed entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub category: Category,
    pub mood_emoji: String,
    pub kindness_count: u64,
    pub anonymous_id: String,
    /// Author, kept for "my posts"; stripped before the post leaves the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Copy of this post with the author removed.
    pub fn without_author(mut self) -> Self {
        self.user_id = None;
        self
    }
}

impl Record for Post {
    const COLLECTION: Collection = Collection::Posts;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Request body for creating a new post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub content: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub mood_emoji: Option<String>,
}

impl NewPost {
    pub fn new(content: impl Into<String>, category: Category, mood_emoji: &str) -> Self {
        Self {
            content: content.into(),
            category: Some(category),
            mood_emoji: Some(mood_emoji.to_string()),
        }
    }

    /// Check the post locally and return its category.
    pub fn validate(&self) -> Result<Category, AppError> {
        if self.content.trim().is_empty() {
            return Err(AppError::Validation(
                "Please write something to share".to_string(),
            ));
        }
        self.category
            .ok_or_else(|| AppError::Validation("Please select a category".to_string()))
    }

    /// Mood to store, falling back to [`DEFAULT_MOOD`].
    pub fn mood(&self) -> String {
        self.mood_emoji
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MOOD)
            .to_string()
    }
}

//! Editable profile record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Collection, Record};
use crate::errors::AppError;

/// Bio written for a profile on first view.
pub const DEFAULT_BIO: &str = "A member of the ShareSpace community 🌟";

/// Maximum bio length, counted in characters.
pub const MAX_BIO_CHARS: usize = 500;

/// Maximum decoded size of an embedded profile picture.
pub const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;

/// An embedded image stored as a `data:image/...;base64,` URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ProfilePicture(String);

impl ProfilePicture {
    /// Wrap a data URL, rejecting anything that is not an image or is too large.
    pub fn from_data_url(data_url: impl Into<String>) -> Result<Self, AppError> {
        let picture = Self(data_url.into());
        picture.validate()?;
        Ok(picture)
    }

    pub fn data_url(&self) -> &str {
        &self.0
    }

    /// Decode the embedded image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, AppError> {
        let payload = self
            .0
            .strip_prefix("data:image/")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(_, payload)| payload.trim_end())
            .ok_or_else(|| {
                AppError::Validation("Profile picture must be an embedded image".to_string())
            })?;

        STANDARD.decode(payload).map_err(|e| {
            AppError::Validation(format!("Profile picture is not valid base64: {}", e))
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let size = self.decode()?.len();
        if size > MAX_PICTURE_BYTES {
            return Err(AppError::PayloadTooLarge(format!(
                "Image is {} bytes; the limit is {} bytes",
                size, MAX_PICTURE_BYTES
            )));
        }
        Ok(())
    }
}

/// One profile per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub name: String,
    pub bio: String,
    pub join_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<ProfilePicture>,
}

impl Record for Profile {
    const COLLECTION: Collection = Collection::UserProfiles;

    fn id(&self) -> &str {
        &self.user_id
    }
}

/// Partial edit of a profile. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<ProfilePicture>,
}

impl ProfileUpdate {
    /// Check every field, returning the first failure.
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Name cannot be empty".to_string()));
            }
        }
        if let Some(bio) = &self.bio {
            let len = bio.chars().count();
            if len > MAX_BIO_CHARS {
                return Err(AppError::Validation(format!(
                    "Bio is {} characters; the limit is {}",
                    len, MAX_BIO_CHARS
                )));
            }
        }
        if let Some(picture) = &self.profile_picture {
            picture.validate()?;
        }
        Ok(())
    }

    /// Produce the edited record without touching `current`.
    pub fn apply(&self, current: &Profile) -> Profile {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = name.trim().to_string();
        }
        if let Some(bio) = &self.bio {
            next.bio = bio.clone();
        }
        if let Some(picture) = &self.profile_picture {
            next.profile_picture = Some(picture.clone());
        }
        next
    }
}

/// Activity shown on the profile page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub post_count: usize,
    pub kindness_received: u64,
    pub comments_received: usize,
}

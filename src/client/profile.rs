//! Profile manager: one editable profile per user, created on first view.

use chrono::Utc;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{Profile, ProfileUpdate, User, DEFAULT_BIO};

#[derive(Clone)]
pub struct ProfileManager {
    store: Repository,
}

impl ProfileManager {
    pub fn new(store: Repository) -> Self {
        Self { store }
    }

    /// The user's profile, creating the default one on first access.
    pub async fn get_or_create(&self, user: &User) -> Result<Profile, AppError> {
        if let Some(profile) = self.store.get::<Profile>(&user.id).await? {
            return Ok(profile);
        }

        let fresh = Profile {
            user_id: user.id.clone(),
            name: user.name.clone(),
            bio: DEFAULT_BIO.to_string(),
            join_date: Utc::now(),
            profile_picture: None,
        };
        if self.store.insert(&fresh).await? {
            tracing::info!(user_id = %user.id, "Created profile");
            return Ok(fresh);
        }

        // Lost a race with another creator; theirs is the profile
        self.get(&user.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Profile {} vanished", user.id)))
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.store.get::<Profile>(user_id).await
    }

    /// Apply an edit. The update is validated in full before anything is
    /// written, and the stored record is replaced in one step.
    pub async fn update(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, AppError> {
        update.validate()?;

        self.store
            .update::<Profile, _>(user_id, |current| {
                *current = update.apply(current);
                Ok(())
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No profile for user {}", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProfilePicture, MAX_BIO_CHARS};
    use tempfile::TempDir;

    async fn manager() -> (ProfileManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Repository::open(&temp_dir.path().join("profile.sqlite"))
            .await
            .unwrap();
        (ProfileManager::new(store), temp_dir)
    }

    fn user() -> User {
        User {
            id: "user-1".into(),
            name: "Sky".into(),
            email: "sky@example.com".into(),
            anonymous_id: "Anonymous Star".into(),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (profiles, _dir) = manager().await;
        let first = profiles.get_or_create(&user()).await.unwrap();
        assert_eq!(first.bio, DEFAULT_BIO);
        assert_eq!(first.name, "Sky");

        let second = profiles.get_or_create(&user()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_bio_round_trip() {
        let (profiles, _dir) = manager().await;
        profiles.get_or_create(&user()).await.unwrap();

        let update = ProfileUpdate {
            bio: Some("x".into()),
            ..Default::default()
        };
        profiles.update("user-1", &update).await.unwrap();
        assert_eq!(profiles.get_or_create(&user()).await.unwrap().bio, "x");
    }

    #[tokio::test]
    async fn test_rejected_updates_leave_profile_unchanged() {
        let (profiles, _dir) = manager().await;
        let before = profiles.get_or_create(&user()).await.unwrap();

        let long_bio = ProfileUpdate {
            name: Some("Renamed".into()),
            bio: Some("b".repeat(MAX_BIO_CHARS + 1)),
            ..Default::default()
        };
        assert!(matches!(
            profiles.update("user-1", &long_bio).await,
            Err(AppError::Validation(_))
        ));

        // 6 MiB decoded
        let big = format!("data:image/png;base64,{}", "A".repeat(8 * 1024 * 1024));
        let oversized: ProfileUpdate =
            serde_json::from_value(serde_json::json!({ "profilePicture": big })).unwrap();
        assert!(matches!(
            profiles.update("user-1", &oversized).await,
            Err(AppError::PayloadTooLarge(_))
        ));

        assert_eq!(profiles.get("user-1").await.unwrap(), Some(before));
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let (profiles, _dir) = manager().await;
        profiles.get_or_create(&user()).await.unwrap();

        let picture = ProfilePicture::from_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        let updated = profiles
            .update(
                "user-1",
                &ProfileUpdate {
                    name: Some("  Skylar ".into()),
                    bio: None,
                    profile_picture: Some(picture.clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Skylar");
        assert_eq!(updated.bio, DEFAULT_BIO);
        assert_eq!(updated.profile_picture, Some(picture));
    }

    #[tokio::test]
    async fn test_update_without_profile_is_not_found() {
        let (profiles, _dir) = manager().await;
        let err = profiles
            .update("ghost", &ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

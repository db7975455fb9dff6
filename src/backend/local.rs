//! Store-backed backend: the authority and content service over a
//! [`Repository`]. The HTTP server exposes exactly this implementation.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthAuthority, ContentBackend};
use crate::auth;
use crate::db::{Collection, Record, Repository};
use crate::errors::AppError;
use crate::moderation::Moderator;
use crate::models::{
    normalize_email, random_anonymous_name, Category, CategoryFilter, Comment, LoginRequest,
    NewComment, NewPost, Post, Session, SignupRequest, User, COMMENT_ALIAS,
};

/// How long a registered external session identifier stays redeemable.
pub const EXTERNAL_SESSION_TTL_MINUTES: i64 = 10;

/// Whether a user may send kindness to the same post more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindnessPolicy {
    #[default]
    Unlimited,
    OncePerUser,
}

impl FromStr for KindnessPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unlimited" => Ok(KindnessPolicy::Unlimited),
            "once-per-user" => Ok(KindnessPolicy::OncePerUser),
            other => Err(AppError::Validation(format!(
                "Unknown kindness policy: {}",
                other
            ))),
        }
    }
}

/// Tunables for [`LocalBackend`].
#[derive(Debug, Clone)]
pub struct LocalSettings {
    /// Blocked phrases; `None` keeps the built-in list
    pub moderation_terms: Option<Vec<String>>,
    pub kindness_policy: KindnessPolicy,
    pub token_ttl_hours: i64,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            moderation_terms: None,
            kindness_policy: KindnessPolicy::Unlimited,
            token_ttl_hours: 168,
        }
    }
}

/// Login record, keyed by normalized email.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    email: String,
    user_id: String,
    /// `None` for accounts created through an external provider
    password_hash: Option<String>,
}

impl Record for Account {
    const COLLECTION: Collection = Collection::Accounts;

    fn id(&self) -> &str {
        &self.email
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IssuedToken {
    token: String,
    user_id: String,
    issued_at: DateTime<Utc>,
}

impl Record for IssuedToken {
    const COLLECTION: Collection = Collection::Tokens;

    fn id(&self) -> &str {
        &self.token
    }
}

/// A one-time identifier handed to the client by an external provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSession {
    pub session_id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Record for ExternalSession {
    const COLLECTION: Collection = Collection::ExternalSessions;

    fn id(&self) -> &str {
        &self.session_id
    }
}

/// Marks that a user already sent kindness to a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KindnessMark {
    id: String,
    post_id: String,
    user_id: String,
}

impl Record for KindnessMark {
    const COLLECTION: Collection = Collection::Kindness;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Authority and content service over the embedded store.
pub struct LocalBackend {
    repo: Repository,
    moderator: Moderator,
    kindness_policy: KindnessPolicy,
    token_ttl: Duration,
}

impl LocalBackend {
    pub fn new(repo: Repository, settings: LocalSettings) -> Self {
        let moderator = match settings.moderation_terms {
            Some(terms) => Moderator::new(terms),
            None => Moderator::default(),
        };

        Self {
            repo,
            moderator,
            kindness_policy: settings.kindness_policy,
            token_ttl: Duration::hours(settings.token_ttl_hours),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Register a one-time identifier for `email`, as an external provider
    /// callback would. Returns the identifier to hand to the client.
    pub async fn register_external_session(
        &self,
        email: &str,
        name: &str,
    ) -> Result<String, AppError> {
        let pending = ExternalSession {
            session_id: auth::generate_token(),
            email: normalize_email(email),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        self.repo.put(&pending).await?;
        Ok(pending.session_id)
    }

    /// Insert the welcome posts when the feed is empty. Returns how many
    /// were inserted.
    pub async fn seed_default_posts(&self) -> Result<usize, AppError> {
        if self.repo.count::<Post>().await? > 0 {
            return Ok(0);
        }

        let now = Utc::now();
        // Oldest first, so the feed lists them newest first
        let defaults = [
            (
                "Had a great day today! Sometimes the small wins matter most.",
                Category::Motivation,
                "😊",
                8,
                "Anonymous Phoenix",
                now - Duration::days(1),
            ),
            (
                "Feeling stressed about upcoming exams but trying to stay positive. Anyone else in the same boat?",
                Category::Academics,
                "😰",
                12,
                "Anonymous Butterfly",
                now,
            ),
        ];

        for (content, category, mood, kindness, alias, created_at) in defaults {
            let post = Post {
                id: uuid::Uuid::new_v4().to_string(),
                content: content.to_string(),
                category,
                mood_emoji: mood.to_string(),
                kindness_count: kindness,
                anonymous_id: alias.to_string(),
                user_id: None,
                created_at,
            };
            self.repo.put(&post).await?;
        }

        tracing::info!("Seeded {} default posts", defaults.len());
        Ok(defaults.len())
    }

    async fn issue_session(&self, user: User) -> Result<Session, AppError> {
        let issued = IssuedToken {
            token: auth::generate_token(),
            user_id: user.id.clone(),
            issued_at: Utc::now(),
        };
        self.repo.put(&issued).await?;

        Ok(Session {
            token: issued.token,
            user,
        })
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<String>,
    ) -> Result<User, AppError> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            anonymous_id: random_anonymous_name(),
        };
        let account = Account {
            email: user.email.clone(),
            user_id: user.id.clone(),
            password_hash,
        };

        self.repo.put(&user).await?;
        self.repo.put(&account).await?;
        tracing::info!(user_id = %user.id, "Created user");

        Ok(user)
    }

    async fn user_for_account(&self, account: &Account) -> Result<User, AppError> {
        self.repo
            .get::<User>(&account.user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Account {} has no user", account.email)))
    }

    async fn require_post(&self, post_id: &str) -> Result<Post, AppError> {
        self.repo
            .get::<Post>(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
    }
}

async fn hash_in_background(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

async fn verify_in_background(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))
}

#[async_trait]
impl AuthAuthority for LocalBackend {
    async fn login(&self, request: &LoginRequest) -> Result<Session, AppError> {
        let email = normalize_email(&request.email);
        let account = self
            .repo
            .get::<Account>(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let hash = account
            .password_hash
            .clone()
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_in_background(request.password.clone(), hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let user = self.user_for_account(&account).await?;
        self.issue_session(user).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<Session, AppError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        if self.repo.get::<Account>(&email).await?.is_some() {
            return Err(AppError::DuplicateAccount(
                "An account with this email already exists".to_string(),
            ));
        }

        let hash = hash_in_background(request.password.clone()).await?;
        let user = self.create_user(&request.name, &email, Some(hash)).await?;
        self.issue_session(user).await
    }

    async fn exchange_external_session(&self, session_id: &str) -> Result<Session, AppError> {
        let pending = self
            .repo
            .take::<ExternalSession>(session_id)
            .await?
            .ok_or_else(|| {
                AppError::ExternalAuthFailure("Unknown or already used session".to_string())
            })?;

        if Utc::now() - pending.created_at > Duration::minutes(EXTERNAL_SESSION_TTL_MINUTES) {
            return Err(AppError::ExternalAuthFailure(
                "External session expired".to_string(),
            ));
        }

        let user = match self.repo.get::<Account>(&pending.email).await? {
            Some(account) => self.user_for_account(&account).await?,
            None => {
                let name = if pending.name.is_empty() {
                    pending.email.split('@').next().unwrap_or("Friend").to_string()
                } else {
                    pending.name.clone()
                };
                self.create_user(&name, &pending.email, None).await?
            }
        };

        self.issue_session(user).await
    }

    async fn who_am_i(&self, token: &str) -> Result<User, AppError> {
        let issued = self
            .repo
            .get::<IssuedToken>(token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session expired or invalid".to_string()))?;

        if Utc::now() - issued.issued_at > self.token_ttl {
            self.repo.delete::<IssuedToken>(token).await?;
            return Err(AppError::Unauthorized("Session expired".to_string()));
        }

        self.repo
            .get::<User>(&issued.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session user no longer exists".to_string()))
    }

    async fn logout(&self, token: &str) -> Result<(), AppError> {
        if !self.repo.delete::<IssuedToken>(token).await? {
            tracing::debug!("Logout for unknown token ignored");
        }
        Ok(())
    }
}

#[async_trait]
impl ContentBackend for LocalBackend {
    async fn list_posts(
        &self,
        _session: &Session,
        filter: CategoryFilter,
    ) -> Result<Vec<Post>, AppError> {
        let posts = self
            .repo
            .list_recent::<Post, _>(move |p| filter.matches(p))
            .await?;
        Ok(posts.into_iter().map(Post::without_author).collect())
    }

    async fn list_my_posts(&self, session: &Session) -> Result<Vec<Post>, AppError> {
        let user_id = session.user.id.clone();
        self.repo
            .list_recent::<Post, _>(move |p| p.user_id.as_deref() == Some(user_id.as_str()))
            .await
    }

    async fn create_post(&self, session: &Session, post: &NewPost) -> Result<Post, AppError> {
        let category = post.validate()?;

        let stored = Post {
            id: uuid::Uuid::new_v4().to_string(),
            content: post.content.trim().to_string(),
            category,
            mood_emoji: post.mood(),
            kindness_count: 0,
            anonymous_id: random_anonymous_name(),
            user_id: Some(session.user.id.clone()),
            created_at: Utc::now(),
        };
        self.repo.put(&stored).await?;
        tracing::debug!(post_id = %stored.id, category = %category, "Post created");

        Ok(stored.without_author())
    }

    async fn send_kindness(&self, session: &Session, post_id: &str) -> Result<Post, AppError> {
        if self.kindness_policy == KindnessPolicy::OncePerUser {
            let mark = KindnessMark {
                id: format!("{}:{}", post_id, session.user.id),
                post_id: post_id.to_string(),
                user_id: session.user.id.clone(),
            };
            self.require_post(post_id).await?;
            if !self.repo.insert(&mark).await? {
                return Ok(self.require_post(post_id).await?.without_author());
            }
        }

        let post = self
            .repo
            .update::<Post, _>(post_id, |p| {
                p.kindness_count = p.kindness_count.saturating_add(1);
                Ok(())
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

        Ok(post.without_author())
    }

    async fn list_comments(
        &self,
        _session: &Session,
        post_id: &str,
    ) -> Result<Vec<Comment>, AppError> {
        self.require_post(post_id).await?;
        let post_id = post_id.to_string();
        self.repo
            .list::<Comment, _>(move |c| c.post_id == post_id)
            .await
    }

    async fn create_comment(
        &self,
        _session: &Session,
        post_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, AppError> {
        comment.validate()?;
        self.require_post(post_id).await?;
        self.moderator.check(&comment.content)?;

        let stored = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            content: comment.content.trim().to_string(),
            anonymous_id: COMMENT_ALIAS.to_string(),
            created_at: Utc::now(),
        };
        self.repo.put(&stored).await?;

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn backend(settings: LocalSettings) -> (LocalBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::open(&temp_dir.path().join("authority.sqlite"))
            .await
            .unwrap();
        (LocalBackend::new(repo, settings), temp_dir)
    }

    fn signup_request(email: &str) -> SignupRequest {
        SignupRequest {
            name: "Robin".to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_login_who_am_i_logout() {
        let (backend, _dir) = backend(LocalSettings::default()).await;

        let session = backend.signup(&signup_request("Robin@Example.com")).await.unwrap();
        assert_eq!(session.user.email, "robin@example.com");
        assert_eq!(backend.who_am_i(&session.token).await.unwrap(), session.user);

        let login = backend
            .login(&LoginRequest {
                email: "robin@example.com".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, session.user.id);
        assert_ne!(login.token, session.token);

        backend.logout(&session.token).await.unwrap();
        assert!(matches!(
            backend.who_am_i(&session.token).await,
            Err(AppError::Unauthorized(_))
        ));
        // The other token is unaffected
        assert!(backend.who_am_i(&login.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_signup_and_bad_password() {
        let (backend, _dir) = backend(LocalSettings::default()).await;
        backend.signup(&signup_request("dup@example.com")).await.unwrap();

        let err = backend.signup(&signup_request("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateAccount(_)));

        let err = backend
            .login(&LoginRequest {
                email: "dup@example.com".into(),
                password: "wrong-password".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, AppError::InvalidCredentials);

        let err = backend
            .login(&LoginRequest {
                email: "nobody@example.com".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, AppError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_external_session_is_one_shot() {
        let (backend, _dir) = backend(LocalSettings::default()).await;
        let id = backend
            .register_external_session("oauth@example.com", "Oak")
            .await
            .unwrap();

        let session = backend.exchange_external_session(&id).await.unwrap();
        assert_eq!(session.user.name, "Oak");

        let replay = backend.exchange_external_session(&id).await.unwrap_err();
        assert!(matches!(replay, AppError::ExternalAuthFailure(_)));

        // A second provider login maps to the same user
        let again = backend
            .register_external_session("OAUTH@example.com", "Oak")
            .await
            .unwrap();
        let second = backend.exchange_external_session(&again).await.unwrap();
        assert_eq!(second.user.id, session.user.id);

        // Provider-created accounts have no password
        let err = backend
            .login(&LoginRequest {
                email: "oauth@example.com".into(),
                password: "anything".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, AppError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let (backend, _dir) = backend(LocalSettings {
            token_ttl_hours: 0,
            ..Default::default()
        })
        .await;
        let session = backend.signup(&signup_request("ttl@example.com")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(matches!(
            backend.who_am_i(&session.token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let (backend, _dir) = backend(LocalSettings::default()).await;
        assert_eq!(backend.seed_default_posts().await.unwrap(), 2);
        assert_eq!(backend.seed_default_posts().await.unwrap(), 0);

        let session = backend.signup(&signup_request("seed@example.com")).await.unwrap();
        let posts = backend.list_posts(&session, CategoryFilter::All).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].anonymous_id, "Anonymous Butterfly");
        assert_eq!(posts[0].kindness_count, 12);
    }

    #[tokio::test]
    async fn test_once_per_user_kindness() {
        let (backend, _dir) = backend(LocalSettings {
            kindness_policy: KindnessPolicy::OncePerUser,
            ..Default::default()
        })
        .await;
        let alice = backend.signup(&signup_request("alice@example.com")).await.unwrap();
        let bob = backend.signup(&signup_request("bob@example.com")).await.unwrap();
        let post = backend
            .create_post(&alice, &NewPost::new("hi", Category::Motivation, "😊"))
            .await
            .unwrap();

        assert_eq!(backend.send_kindness(&bob, &post.id).await.unwrap().kindness_count, 1);
        assert_eq!(backend.send_kindness(&bob, &post.id).await.unwrap().kindness_count, 1);
        assert_eq!(backend.send_kindness(&alice, &post.id).await.unwrap().kindness_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_once_per_user_kindness_parallel_sends() {
        let (backend, _dir) = backend(LocalSettings {
            kindness_policy: KindnessPolicy::OncePerUser,
            ..Default::default()
        })
        .await;
        let backend = std::sync::Arc::new(backend);
        let alice = backend.signup(&signup_request("alice@example.com")).await.unwrap();
        let bob = backend.signup(&signup_request("bob@example.com")).await.unwrap();
        let post = backend
            .create_post(&alice, &NewPost::new("hi", Category::Motivation, "😊"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let backend = backend.clone();
                let bob = bob.clone();
                let post_id = post.id.clone();
                tokio::spawn(async move { backend.send_kindness(&bob, &post_id).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().kindness_count <= 1);
        }

        let stored = backend.repo.get::<Post>(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.kindness_count, 1);
    }

    #[tokio::test]
    async fn test_posts_hide_author_except_my_posts() {
        let (backend, _dir) = backend(LocalSettings::default()).await;
        let session = backend.signup(&signup_request("me@example.com")).await.unwrap();
        let created = backend
            .create_post(&session, &NewPost::new("  mine  ", Category::SelfDoubt, "😔"))
            .await
            .unwrap();
        assert_eq!(created.content, "mine");
        assert_eq!(created.user_id, None);

        let mine = backend.list_my_posts(&session).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id.as_deref(), Some(session.user.id.as_str()));
    }

    #[tokio::test]
    async fn test_comment_rules() {
        let (backend, _dir) = backend(LocalSettings::default()).await;
        let session = backend.signup(&signup_request("c@example.com")).await.unwrap();
        let post = backend
            .create_post(&session, &NewPost::new("hi", Category::Relationships, "🤗"))
            .await
            .unwrap();

        let err = backend
            .create_comment(&session, &post.id, &NewComment { content: "you are pathetic".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ModerationRejected(_)));

        let err = backend
            .create_comment(&session, "no-such-post", &NewComment { content: "hello".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let comment = backend
            .create_comment(&session, &post.id, &NewComment { content: "sending hugs".into() })
            .await
            .unwrap();
        assert_eq!(comment.anonymous_id, COMMENT_ALIAS);
        assert_eq!(
            backend.list_comments(&session, &post.id).await.unwrap(),
            vec![comment]
        );
    }
}

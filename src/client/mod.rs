//! Client-side core.
//!
//! [`ShareSpace`] wires the managers around one session context. Feed and
//! comment calls go through the configured backend; journal entries, profiles
//! and the session token stay in the client's own store.

mod comments;
mod feed;
mod journal;
mod profile;
mod session;

pub use comments::*;
pub use feed::*;
pub use journal::*;
pub use profile::*;
pub use session::*;

use std::sync::Arc;

use reqwest::Url;

use crate::backend::{AuthAuthority, ContentBackend, HttpBackend, LocalBackend};
use crate::config::{BackendKind, ClientConfig};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{
    CategoryFilter, Comment, EntryFilter, JournalEntry, NewJournalEntry, NewPost, Post, Profile,
    ProfileSummary, ProfileUpdate, Session, SignupRequest, User,
};

/// One signed-in (or signed-out) client.
pub struct ShareSpace {
    gateway: SessionGateway,
    content: Arc<dyn ContentBackend>,
    feed: FeedSynchronizer,
    comments: CommentThreads,
    journal: JournalManager,
    profiles: ProfileManager,
}

impl ShareSpace {
    /// Open the client store and pick the backend named by `config`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, AppError> {
        let store = Repository::open(&config.data_path).await?;

        match &config.backend {
            BackendKind::Local => {
                let local = Arc::new(LocalBackend::new(store.clone(), config.local.clone()));
                local.seed_default_posts().await?;
                tracing::info!("Using local backend at {:?}", config.data_path);
                Ok(Self::from_parts(store, local.clone(), local))
            }
            BackendKind::Remote { base_url } => {
                let remote = Arc::new(HttpBackend::new(base_url)?);
                tracing::info!("Using remote backend at {}", remote.base_url());
                Ok(Self::from_parts(store, remote.clone(), remote))
            }
        }
    }

    pub fn from_parts(
        store: Repository,
        authority: Arc<dyn AuthAuthority>,
        content: Arc<dyn ContentBackend>,
    ) -> Self {
        Self {
            gateway: SessionGateway::new(authority, store.clone()),
            feed: FeedSynchronizer::new(content.clone()),
            comments: CommentThreads::new(content.clone()),
            journal: JournalManager::new(store.clone()),
            profiles: ProfileManager::new(store),
            content,
        }
    }

    pub fn session_gateway(&self) -> &SessionGateway {
        &self.gateway
    }

    pub fn feed(&self) -> &FeedSynchronizer {
        &self.feed
    }

    pub fn comments(&self) -> &CommentThreads {
        &self.comments
    }

    pub fn journal(&self) -> &JournalManager {
        &self.journal
    }

    pub fn profiles(&self) -> &ProfileManager {
        &self.profiles
    }

    // Session

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.gateway.login(email, password).await
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<Session, AppError> {
        self.gateway.signup(request).await
    }

    pub async fn exchange_from_url(&self, url: &mut Url) -> Result<Option<Session>, AppError> {
        self.gateway.exchange_from_url(url).await
    }

    pub async fn current_user(&self) -> Result<Option<User>, AppError> {
        self.gateway.current_user().await
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        self.gateway.logout().await
    }

    // Feed

    pub async fn refresh_feed(&self) -> Result<Vec<Post>, AppError> {
        let session = self.gateway.require().await?;
        let result = self.feed.refresh(&session).await;
        self.gateway.observe(result).await
    }

    pub async fn list_posts(&self, filter: CategoryFilter) -> Result<Vec<Post>, AppError> {
        let session = self.gateway.require().await?;
        let result = self.feed.list_posts(&session, filter).await;
        self.gateway.observe(result).await
    }

    pub async fn send_kindness(&self, post_id: &str) -> Result<Post, AppError> {
        let session = self.gateway.require().await?;
        let result = self.feed.send_kindness(&session, post_id).await;
        self.gateway.observe(result).await
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post, AppError> {
        let session = self.gateway.require().await?;
        let result = self.feed.create_post(&session, post).await;
        self.gateway.observe(result).await
    }

    // Comments

    pub async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, AppError> {
        let session = self.gateway.require().await?;
        let result = self.comments.list_comments(&session, post_id).await;
        self.gateway.observe(result).await
    }

    pub async fn toggle_comments(&self, post_id: &str) -> Result<Option<Vec<Comment>>, AppError> {
        let session = self.gateway.require().await?;
        let result = self.comments.toggle(&session, post_id).await;
        self.gateway.observe(result).await
    }

    pub async fn post_comment(&self, post_id: &str, content: &str) -> Result<Comment, AppError> {
        let session = self.gateway.require().await?;
        let result = self.comments.post_comment(&session, post_id, content).await;
        self.gateway.observe(result).await
    }

    // Journal

    pub async fn create_journal_entry(
        &self,
        entry: &NewJournalEntry,
    ) -> Result<JournalEntry, AppError> {
        let user = self.gateway.require().await?.user;
        self.journal.create(&user.id, entry).await
    }

    pub async fn delete_journal_entry(&self, entry_id: &str) -> Result<bool, AppError> {
        let user = self.gateway.require().await?.user;
        self.journal.delete(&user.id, entry_id).await
    }

    pub async fn journal_entries(
        &self,
        filter: EntryFilter,
    ) -> Result<Vec<JournalEntry>, AppError> {
        let user = self.gateway.require().await?.user;
        self.journal.list_by_type(&user.id, filter).await
    }

    // Profile

    pub async fn profile(&self) -> Result<Profile, AppError> {
        let user = self.gateway.require().await?.user;
        self.profiles.get_or_create(&user).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, AppError> {
        update.validate()?;
        let user = self.gateway.require().await?.user;
        self.profiles.get_or_create(&user).await?;
        self.profiles.update(&user.id, update).await
    }

    /// Activity on the signed-in user's own posts.
    pub async fn profile_summary(&self) -> Result<ProfileSummary, AppError> {
        let session = self.gateway.require().await?;
        let result = self.summarize(&session).await;
        self.gateway.observe(result).await
    }

    async fn summarize(&self, session: &Session) -> Result<ProfileSummary, AppError> {
        let posts = self.content.list_my_posts(session).await?;

        let mut summary = ProfileSummary {
            post_count: posts.len(),
            ..Default::default()
        };
        for post in &posts {
            summary.kindness_received += post.kindness_count;
            let comments = self.content.list_comments(session, &post.id).await?;
            summary.comments_received += comments.len();
        }
        Ok(summary)
    }
}

//! Feed synchronizer.
//!
//! Keeps the last authoritative post list for the active category and the
//! kindness sends still in flight. What callers see is the authoritative
//! list with pending sends added on top; a post returned by the backend
//! replaces the cached copy, so reconciliation never double counts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::ContentBackend;
use crate::errors::AppError;
use crate::models::{CategoryFilter, NewPost, Post, Session};

/// Load state of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedState {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last fetch failed; the previous posts are still shown
    Error(String),
}

#[derive(Debug, Default)]
struct FeedCache {
    state: FeedState,
    filter: CategoryFilter,
    posts: Vec<Post>,
    /// In-flight kindness sends per post id
    pending: HashMap<String, u64>,
}

impl FeedCache {
    fn view(&self) -> Vec<Post> {
        self.posts
            .iter()
            .map(|post| {
                let mut post = post.clone();
                if let Some(extra) = self.pending.get(&post.id) {
                    post.kindness_count = post.kindness_count.saturating_add(*extra);
                }
                post
            })
            .collect()
    }

    fn settle(&mut self, post_id: &str) {
        if let Some(count) = self.pending.get_mut(post_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.pending.remove(post_id);
            }
        }
    }

    /// Replace the cached copy with an authoritative one. Counts never go
    /// backwards, so a late response cannot undo a newer one.
    fn reconcile(&mut self, authoritative: Post) {
        if let Some(cached) = self.posts.iter_mut().find(|p| p.id == authoritative.id) {
            let floor = cached.kindness_count;
            *cached = authoritative;
            cached.kindness_count = cached.kindness_count.max(floor);
        }
    }
}

/// Category-filtered post list over a [`ContentBackend`].
///
/// Methods take `&self`, so independent operations (a kindness send and a
/// refresh, say) may run concurrently from separate tasks.
pub struct FeedSynchronizer {
    backend: Arc<dyn ContentBackend>,
    cache: Mutex<FeedCache>,
}

impl FeedSynchronizer {
    pub fn new(backend: Arc<dyn ContentBackend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(FeedCache::default()),
        }
    }

    pub async fn state(&self) -> FeedState {
        self.cache.lock().await.state.clone()
    }

    pub async fn filter(&self) -> CategoryFilter {
        self.cache.lock().await.filter
    }

    /// The posts as currently shown, pending kindness included.
    pub async fn posts(&self) -> Vec<Post> {
        self.cache.lock().await.view()
    }

    /// Kindness sends for `post_id` that have not been answered yet.
    pub async fn pending_kindness(&self, post_id: &str) -> u64 {
        self.cache
            .lock()
            .await
            .pending
            .get(post_id)
            .copied()
            .unwrap_or(0)
    }

    /// Fetch the feed for the active category.
    ///
    /// On failure the state becomes [`FeedState::Error`] and the previous
    /// posts stay in place.
    pub async fn refresh(&self, session: &Session) -> Result<Vec<Post>, AppError> {
        let filter = {
            let mut cache = self.cache.lock().await;
            cache.state = FeedState::Loading;
            cache.filter
        };

        let result = self.backend.list_posts(session, filter).await;

        let mut cache = self.cache.lock().await;
        if cache.filter != filter {
            // A category change started a newer fetch; its result wins
            tracing::debug!("Discarding feed fetch for superseded filter");
            return Ok(cache.view());
        }

        match result {
            Ok(posts) => {
                tracing::debug!(count = posts.len(), "Feed refreshed");
                cache.posts = posts;
                cache.state = FeedState::Ready;
                Ok(cache.view())
            }
            Err(e) => {
                tracing::warn!("Feed refresh failed: {}", e);
                cache.state = FeedState::Error(e.message());
                Err(e)
            }
        }
    }

    /// Switch category and refetch.
    pub async fn list_posts(
        &self,
        session: &Session,
        filter: CategoryFilter,
    ) -> Result<Vec<Post>, AppError> {
        self.cache.lock().await.filter = filter;
        self.refresh(session).await
    }

    /// Send one kindness to `post_id`.
    ///
    /// The shown count rises immediately. When the backend answers, its
    /// post replaces the cached one; on failure the optimistic increment is
    /// dropped. Repeated sends are never blocked here.
    pub async fn send_kindness(&self, session: &Session, post_id: &str) -> Result<Post, AppError> {
        *self
            .cache
            .lock()
            .await
            .pending
            .entry(post_id.to_string())
            .or_insert(0) += 1;

        let result = self.backend.send_kindness(session, post_id).await;

        let mut cache = self.cache.lock().await;
        cache.settle(post_id);
        match result {
            Ok(post) => {
                cache.reconcile(post.clone());
                Ok(post)
            }
            Err(e) => {
                tracing::warn!(post_id = %post_id, "Kindness not delivered: {}", e);
                Err(e)
            }
        }
    }

    /// Create a post and put it at the head of the feed.
    ///
    /// Invalid input is rejected before the backend is contacted and leaves
    /// the feed untouched.
    pub async fn create_post(&self, session: &Session, post: &NewPost) -> Result<Post, AppError> {
        let category = post.validate()?;
        let created = self.backend.create_post(session, post).await?;

        let mut cache = self.cache.lock().await;
        if cache.filter.matches(&created) {
            cache.posts.insert(0, created.clone());
        }
        tracing::debug!(post_id = %created.id, category = %category, "Post added to feed");

        Ok(created)
    }
}

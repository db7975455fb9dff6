//! Comment thread manager.
//!
//! Threads are fetched the first time a post is expanded and cached per post
//! after that. A cached thread is only refetched after [`CommentThreads::invalidate`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::ContentBackend;
use crate::errors::AppError;
use crate::models::{Comment, NewComment, Session};

/// State of the comment box under a post.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PostingStatus {
    #[default]
    Idle,
    Posting,
    Failed(String),
}

#[derive(Debug, Default)]
struct Thread {
    /// `None` until the first fetch
    comments: Option<Vec<Comment>>,
    expanded: bool,
    draft: String,
    status: PostingStatus,
}

/// Per-post comment caches, drafts and posting state.
pub struct CommentThreads {
    backend: Arc<dyn ContentBackend>,
    threads: Mutex<HashMap<String, Thread>>,
}

impl CommentThreads {
    pub fn new(backend: Arc<dyn ContentBackend>) -> Self {
        Self {
            backend,
            threads: Mutex::new(HashMap::new()),
        }
    }

    /// Comments on `post_id`, from the cache when already loaded.
    pub async fn list_comments(
        &self,
        session: &Session,
        post_id: &str,
    ) -> Result<Vec<Comment>, AppError> {
        if let Some(cached) = self.cached(post_id).await {
            return Ok(cached);
        }

        let fetched = self.backend.list_comments(session, post_id).await?;
        tracing::debug!(post_id = %post_id, count = fetched.len(), "Loaded comment thread");

        let mut threads = self.threads.lock().await;
        let thread = threads.entry(post_id.to_string()).or_default();
        // A comment posted while the fetch was in flight is already included
        Ok(thread.comments.get_or_insert(fetched).clone())
    }

    /// The cached thread, without fetching.
    pub async fn cached(&self, post_id: &str) -> Option<Vec<Comment>> {
        self.threads
            .lock()
            .await
            .get(post_id)
            .and_then(|t| t.comments.clone())
    }

    /// Forget the cached thread so the next listing refetches it.
    pub async fn invalidate(&self, post_id: &str) {
        if let Some(thread) = self.threads.lock().await.get_mut(post_id) {
            thread.comments = None;
        }
    }

    /// Expand or collapse a thread. Expanding loads it on first use and
    /// returns the comments; collapsing returns `None`.
    pub async fn toggle(
        &self,
        session: &Session,
        post_id: &str,
    ) -> Result<Option<Vec<Comment>>, AppError> {
        let expanded = {
            let mut threads = self.threads.lock().await;
            let thread = threads.entry(post_id.to_string()).or_default();
            thread.expanded = !thread.expanded;
            thread.expanded
        };

        if !expanded {
            return Ok(None);
        }
        self.list_comments(session, post_id).await.map(Some)
    }

    pub async fn is_expanded(&self, post_id: &str) -> bool {
        self.threads
            .lock()
            .await
            .get(post_id)
            .map(|t| t.expanded)
            .unwrap_or(false)
    }

    pub async fn set_draft(&self, post_id: &str, text: impl Into<String>) {
        self.threads
            .lock()
            .await
            .entry(post_id.to_string())
            .or_default()
            .draft = text.into();
    }

    pub async fn draft(&self, post_id: &str) -> String {
        self.threads
            .lock()
            .await
            .get(post_id)
            .map(|t| t.draft.clone())
            .unwrap_or_default()
    }

    pub async fn status(&self, post_id: &str) -> PostingStatus {
        self.threads
            .lock()
            .await
            .get(post_id)
            .map(|t| t.status.clone())
            .unwrap_or_default()
    }

    /// Post `content` under `post_id`.
    ///
    /// Empty content fails before any I/O. On success the comment is
    /// appended to the cached thread (if loaded) and the draft is cleared.
    /// On failure the draft is kept and the status records the message,
    /// which for a moderation rejection is the server's text verbatim.
    pub async fn post_comment(
        &self,
        session: &Session,
        post_id: &str,
        content: &str,
    ) -> Result<Comment, AppError> {
        let request = NewComment {
            content: content.to_string(),
        };
        request.validate()?;

        self.set_status(post_id, PostingStatus::Posting).await;
        let result = self.backend.create_comment(session, post_id, &request).await;

        let mut threads = self.threads.lock().await;
        let thread = threads.entry(post_id.to_string()).or_default();
        match result {
            Ok(comment) => {
                if let Some(comments) = thread.comments.as_mut() {
                    if !comments.iter().any(|c| c.id == comment.id) {
                        comments.push(comment.clone());
                    }
                }
                thread.draft.clear();
                thread.status = PostingStatus::Idle;
                Ok(comment)
            }
            Err(e) => {
                thread.status = PostingStatus::Failed(e.message());
                Err(e)
            }
        }
    }

    /// Post the current draft for `post_id`.
    pub async fn post_draft(&self, session: &Session, post_id: &str) -> Result<Comment, AppError> {
        let draft = self.draft(post_id).await;
        self.post_comment(session, post_id, &draft).await
    }

    async fn set_status(&self, post_id: &str, status: PostingStatus) {
        self.threads
            .lock()
            .await
            .entry(post_id.to_string())
            .or_default()
            .status = status;
    }
}

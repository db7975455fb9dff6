//! Pluggable backends for the feed and the authentication authority.
//!
//! The client managers only see these traits. [`LocalBackend`] stores
//! everything in the embedded repository (and is what the HTTP server runs);
//! [`HttpBackend`] speaks to that server over REST.

mod http;
mod local;

pub use http::*;
pub use local::*;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{
    CategoryFilter, Comment, LoginRequest, NewComment, NewPost, Post, Session, SignupRequest,
    User,
};

/// Issues and validates bearer tokens.
#[async_trait]
pub trait AuthAuthority: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<Session, AppError>;

    async fn signup(&self, request: &SignupRequest) -> Result<Session, AppError>;

    /// Trade a one-time external session identifier for a session.
    async fn exchange_external_session(&self, session_id: &str) -> Result<Session, AppError>;

    /// Resolve a token to its user, or `Unauthorized`.
    async fn who_am_i(&self, token: &str) -> Result<User, AppError>;

    async fn logout(&self, token: &str) -> Result<(), AppError>;
}

/// Posts, kindness and comments.
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// Posts matching `filter`, newest first.
    async fn list_posts(
        &self,
        session: &Session,
        filter: CategoryFilter,
    ) -> Result<Vec<Post>, AppError>;

    /// Posts written by the session's user, newest first.
    async fn list_my_posts(&self, session: &Session) -> Result<Vec<Post>, AppError>;

    async fn create_post(&self, session: &Session, post: &NewPost) -> Result<Post, AppError>;

    /// Record one kindness and return the authoritative post.
    async fn send_kindness(&self, session: &Session, post_id: &str) -> Result<Post, AppError>;

    /// Comments on a post, in arrival order.
    async fn list_comments(&self, session: &Session, post_id: &str)
        -> Result<Vec<Comment>, AppError>;

    async fn create_comment(
        &self,
        session: &Session,
        post_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, AppError>;
}

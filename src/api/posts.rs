//! Post API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::backend::ContentBackend;
use crate::models::{CategoryFilter, NewPost, Post, Session};
use crate::AppState;

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /api/posts?category= - List posts, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<Vec<Post>> {
    let filter = match query.category.as_deref() {
        Some(raw) => raw.parse::<CategoryFilter>()?,
        None => CategoryFilter::All,
    };

    let posts = state.backend.list_posts(&session, filter).await?;
    success(posts)
}

/// GET /api/posts/mine - Posts written by the caller.
pub async fn list_my_posts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Post>> {
    let posts = state.backend.list_my_posts(&session).await?;
    success(posts)
}

/// POST /api/posts - Create a post.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<NewPost>,
) -> ApiResult<Post> {
    let post = state.backend.create_post(&session, &request).await?;
    success(post)
}

/// POST /api/posts/:id/kindness - Send kindness, returning the updated post.
pub async fn send_kindness(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Post> {
    let post = state.backend.send_kindness(&session, &id).await?;
    success(post)
}

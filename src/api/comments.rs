//! Comment API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{success, ApiResult};
use crate::backend::ContentBackend;
use crate::models::{Comment, NewComment, Session};
use crate::AppState;

/// GET /api/posts/:id/comments - A post's thread in arrival order.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Comment>> {
    let comments = state.backend.list_comments(&session, &id).await?;
    success(comments)
}

/// POST /api/posts/:id/comments - Add a comment, subject to moderation.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<NewComment>,
) -> ApiResult<Comment> {
    match state.backend.create_comment(&session, &id, &request).await {
        Ok(comment) => success(comment),
        Err(e) => {
            tracing::debug!(post_id = %id, "Comment rejected: {}", e);
            Err(e)
        }
    }
}

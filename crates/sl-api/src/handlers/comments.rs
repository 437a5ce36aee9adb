//! Photo comments. Any signed-in user may read and post; deletion is
//! restricted to the comment's author or an admin.

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use sl_core::error::AppError;
use sl_core::models::{CommentWithAuthor, ImageComment};
use sl_core::validate::CommentForm;

use crate::error::ApiError;
use crate::guard::CurrentUser;
use crate::handlers::load_project;
use crate::AppState;

async fn load_image(
    state: &AppState,
    project_id: Uuid,
    image_id: Uuid,
) -> Result<(), ApiError> {
    state
        .images
        .get(image_id)
        .await?
        .filter(|img| img.project_id == project_id)
        .ok_or_else(|| AppError::not_found("Image", image_id))?;
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    Path((user_id, project_id, image_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<Vec<CommentWithAuthor>>, ApiError> {
    load_project(&state, user_id, project_id).await?;
    load_image(&state, project_id, image_id).await?;
    Ok(Json(state.comments.list_by_image(image_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path((user_id, project_id, image_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(form): Json<CommentForm>,
) -> Result<Json<ImageComment>, ApiError> {
    let draft = form.validate().map_err(AppError::Validation)?;
    let project = load_project(&state, user_id, project_id).await?;
    load_image(&state, project_id, image_id).await?;

    let comment = ImageComment {
        id: Uuid::new_v4(),
        image_id,
        user_id: viewer.id,
        text: draft.text,
        created_at: Utc::now(),
    };
    state.comments.create(&comment).await?;

    // Cross-notify: admin comments go to the project owner, client
    // comments go to the admin.
    let anchor = format!("image-{image_id}");
    if viewer.is_admin {
        if let Some(owner) = state.users.get(project.user_id).await? {
            if owner.id != viewer.id {
                state
                    .notifier
                    .comment_added(&owner, &viewer.name, &project, &comment.text, &anchor);
            }
        }
    } else if let Some(admin) = state.users.find_admin().await? {
        state
            .notifier
            .comment_added(&admin, &viewer.name, &project, &comment.text, &anchor);
    }

    Ok(Json(comment))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path((user_id, project_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_project(&state, user_id, project_id).await?;
    let comment = state
        .comments
        .get(comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment", comment_id))?;

    if comment.user_id != viewer.id && !viewer.is_admin {
        return Err(AppError::Forbidden("only the author or an admin may delete".into()).into());
    }

    state.comments.delete(comment_id).await?;
    Ok(Json(json!({ "deleted": comment_id })))
}

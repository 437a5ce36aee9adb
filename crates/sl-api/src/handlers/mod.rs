//! Route handlers, grouped by resource.

pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod media;
pub mod projects;
pub mod updates;
pub mod users;

use uuid::Uuid;

use sl_core::error::AppError;
use sl_core::models::Project;

use crate::error::ApiError;
use crate::AppState;

/// Loads a project and checks it actually belongs to the user in the
/// path; a mismatched pair reads as absent rather than leaking that the
/// project exists elsewhere.
pub(crate) async fn load_project(
    state: &AppState,
    user_id: Uuid,
    project_id: Uuid,
) -> Result<Project, ApiError> {
    let project = state
        .projects
        .get(project_id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| AppError::not_found("Project", project_id))?;
    Ok(project)
}

/// Canonical detail path for a project.
pub(crate) fn project_path(user_id: Uuid, project_id: Uuid) -> String {
    format!("/users/{user_id}/project/{project_id}")
}

//! The signed-in landing page.

use axum::extract::State;
use axum::response::Html;
use axum::Extension;

use sl_core::models::{Project, User};
use sl_ui::IndexTemplate;

use crate::error::{render, ApiError};
use crate::guard::CurrentUser;
use crate::AppState;

pub async fn index(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    let mut accounts: Vec<(User, i64)> = Vec::new();
    let mut projects: Vec<Project> = Vec::new();

    if viewer.is_admin {
        for user in state.users.list().await? {
            let count = state.projects.count_by_user(user.id).await?;
            accounts.push((user, count));
        }
    } else {
        projects = state.projects.list_by_user(viewer.id).await?;
    }

    let page = IndexTemplate {
        title: "Dashboard",
        viewer: &viewer,
        accounts: &accounts,
        projects: &projects,
    };
    render(&page)
}

//! Weekly progress updates. Clients read them; admins write them.

use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Extension;
use chrono::Utc;
use uuid::Uuid;

use sl_core::error::{AppError, FieldError};
use sl_core::models::Update;
use sl_core::validate::UpdateForm;
use sl_ui::{ConfirmDeleteTemplate, UpdateDetailTemplate, UpdateFormTemplate, UpdateListTemplate};

use crate::error::{render, ApiError};
use crate::guard::CurrentUser;
use crate::handlers::{load_project, project_path};
use crate::AppState;

async fn load_update(
    state: &AppState,
    project_id: Uuid,
    update_id: Uuid,
) -> Result<Update, ApiError> {
    let update = state
        .updates
        .get(update_id)
        .await?
        .filter(|u| u.project_id == project_id)
        .ok_or_else(|| AppError::not_found("Update", update_id))?;
    Ok(update)
}

pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    let project = load_project(&state, user_id, project_id).await?;
    let updates = state.updates.list_by_project(project_id).await?;
    let page = UpdateListTemplate {
        title: "Weekly updates",
        project: &project,
        updates: &updates,
        viewer_is_admin: viewer.is_admin,
    };
    render(&page)
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path((user_id, project_id, update_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    let project = load_project(&state, user_id, project_id).await?;
    let update = load_update(&state, project_id, update_id).await?;
    let page = UpdateDetailTemplate {
        title: &update.title,
        project: &project,
        update: &update,
        viewer_is_admin: viewer.is_admin,
    };
    render(&page)
}

pub async fn create_form(
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    render_form(
        "Post weekly update",
        &format!("{}/weekly-update/create", project_path(user_id, project_id)),
        &UpdateForm::default(),
        &Vec::new(),
    )
}

pub async fn create(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
    Form(form): Form<UpdateForm>,
) -> Result<Response, ApiError> {
    let action = format!("{}/weekly-update/create", project_path(user_id, project_id));
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(render_form("Post weekly update", &action, &form, &errors)?.into_response())
        }
    };

    let project = load_project(&state, user_id, project_id).await?;
    let update = Update {
        id: Uuid::new_v4(),
        week: draft.week,
        title: draft.title,
        description: draft.description,
        project_id,
        created_at: Utc::now(),
    };
    state.updates.create(&update).await?;

    if let Some(owner) = state.users.get(user_id).await? {
        state.notifier.weekly_update_posted(&owner, &project, &update);
    }
    tracing::info!(update_id = %update.id, %project_id, "weekly update posted");

    Ok(Redirect::to(&format!(
        "{}/weekly-update/{}",
        project_path(user_id, project_id),
        update.id
    ))
    .into_response())
}

pub async fn edit_form(
    State(state): State<AppState>,
    Path((user_id, project_id, update_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    load_project(&state, user_id, project_id).await?;
    let update = load_update(&state, project_id, update_id).await?;
    let form = UpdateForm {
        week: update.week.to_string(),
        title: update.title.clone(),
        description: update.description.clone(),
    };
    render_form(
        "Edit weekly update",
        &format!(
            "{}/weekly-update/{update_id}/update",
            project_path(user_id, project_id)
        ),
        &form,
        &Vec::new(),
    )
}

pub async fn edit(
    State(state): State<AppState>,
    Path((user_id, project_id, update_id)): Path<(Uuid, Uuid, Uuid)>,
    Form(form): Form<UpdateForm>,
) -> Result<Response, ApiError> {
    let action = format!(
        "{}/weekly-update/{update_id}/update",
        project_path(user_id, project_id)
    );
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(render_form("Edit weekly update", &action, &form, &errors)?.into_response())
        }
    };

    load_project(&state, user_id, project_id).await?;
    let mut update = load_update(&state, project_id, update_id).await?;
    update.week = draft.week;
    update.title = draft.title;
    update.description = draft.description;
    state.updates.update(&update).await?;

    Ok(Redirect::to(&format!(
        "{}/weekly-update/{update_id}",
        project_path(user_id, project_id)
    ))
    .into_response())
}

pub async fn delete_form(
    State(state): State<AppState>,
    Path((user_id, project_id, update_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    load_project(&state, user_id, project_id).await?;
    let update = load_update(&state, project_id, update_id).await?;
    let page = ConfirmDeleteTemplate {
        title: "Delete weekly update",
        entity: "weekly update",
        label: &format!("Week {}: {}", update.week, update.title),
        action: &format!(
            "{}/weekly-update/{update_id}/delete",
            project_path(user_id, project_id)
        ),
        cancel: &format!(
            "{}/weekly-update/{update_id}",
            project_path(user_id, project_id)
        ),
    };
    render(&page)
}

pub async fn delete(
    State(state): State<AppState>,
    Path((user_id, project_id, update_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Redirect, ApiError> {
    load_project(&state, user_id, project_id).await?;
    load_update(&state, project_id, update_id).await?;
    state.updates.delete(update_id).await?;
    Ok(Redirect::to(&format!(
        "{}/weekly-updates",
        project_path(user_id, project_id)
    )))
}

fn render_form(
    title: &str,
    action: &str,
    form: &UpdateForm,
    errors: &Vec<FieldError>,
) -> Result<Html<String>, ApiError> {
    let page = UpdateFormTemplate {
        title,
        action,
        form,
        errors,
    };
    render(&page)
}

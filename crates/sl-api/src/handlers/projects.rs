//! Project CRUD. Writes are admin-only; the detail page is the main
//! client-facing view and pulls its pieces concurrently.

use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::Utc;
use uuid::Uuid;

use sl_core::error::{AppError, FieldError};
use sl_core::models::Project;
use sl_core::validate::ProjectForm;
use sl_ui::{ConfirmDeleteTemplate, ProjectDetailTemplate, ProjectFormTemplate};

use crate::error::{render, ApiError};
use crate::guard::CurrentUser;
use crate::handlers::{load_project, project_path};
use crate::AppState;
use axum::Extension;

pub async fn create_form(Path(user_id): Path<Uuid>) -> Result<Html<String>, ApiError> {
    render_form(
        "New project",
        &format!("/users/{user_id}/project"),
        &ProjectForm::default(),
        &Vec::new(),
    )
}

pub async fn create(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Form(form): Form<ProjectForm>,
) -> Result<Response, ApiError> {
    let action = format!("/users/{user_id}/project");
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(render_form("New project", &action, &form, &errors)?.into_response())
        }
    };

    let owner = state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))?;

    let project = Project {
        id: Uuid::new_v4(),
        address: draft.address,
        description: draft.description,
        phase_name: draft.phase_name,
        current_phase: draft.current_phase,
        kind: draft.kind,
        user_id,
        created_at: Utc::now(),
    };
    state.projects.create(&project).await?;
    state.notifier.project_created(&owner, &project);
    tracing::info!(project_id = %project.id, %user_id, "project created");

    Ok(Redirect::to(&project_path(user_id, project.id)).into_response())
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    let project = load_project(&state, user_id, project_id).await?;

    // The detail page needs four more reads; issue them concurrently.
    let (owner, latest_update, images, files) = tokio::join!(
        state.users.get(user_id),
        state.updates.latest_for_project(project_id),
        state.images.list_by_project(project_id),
        state.files.list_by_project(project_id),
    );
    let owner = owner?.ok_or_else(|| AppError::not_found("User", user_id))?;
    let latest_update = latest_update?;
    let images = images?;
    let files = files?;

    let page = ProjectDetailTemplate {
        title: &project.address,
        project: &project,
        owner: &owner,
        latest_update: latest_update.as_ref(),
        images: &images,
        files: &files,
        viewer_is_admin: viewer.is_admin,
    };
    render(&page)
}

pub async fn update_form(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    let project = load_project(&state, user_id, project_id).await?;
    let form = ProjectForm {
        address: project.address.clone(),
        description: project.description.clone(),
        phase_name: project.phase_name.clone(),
        current_phase: project.current_phase.to_string(),
        kind: project.kind.as_str().to_string(),
    };
    render_form(
        "Edit project",
        &format!("{}/update", project_path(user_id, project_id)),
        &form,
        &Vec::new(),
    )
}

pub async fn update(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
    Form(form): Form<ProjectForm>,
) -> Result<Response, ApiError> {
    let action = format!("{}/update", project_path(user_id, project_id));
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(render_form("Edit project", &action, &form, &errors)?.into_response())
        }
    };

    let mut project = load_project(&state, user_id, project_id).await?;
    project.address = draft.address;
    project.description = draft.description;
    project.phase_name = draft.phase_name;
    project.current_phase = draft.current_phase;
    project.kind = draft.kind;
    state.projects.update(&project).await?;

    Ok(Redirect::to(&project_path(user_id, project_id)).into_response())
}

pub async fn delete_form(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    let project = load_project(&state, user_id, project_id).await?;
    let page = ConfirmDeleteTemplate {
        title: "Delete project",
        entity: "project",
        label: &project.address,
        action: &format!("{}/delete", project_path(user_id, project_id)),
        cancel: &project_path(user_id, project_id),
    };
    render(&page)
}

/// Remote media for the project's photos and files is removed before the
/// record cascade, so a media-host failure leaves everything intact.
pub async fn delete(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Redirect, ApiError> {
    load_project(&state, user_id, project_id).await?;
    for image in state.images.list_by_project(project_id).await? {
        state.uploads.remove_image(image.id).await?;
    }
    for file in state.files.list_by_project(project_id).await? {
        state.uploads.remove_file(file.id).await?;
    }
    state.projects.delete(project_id).await?;
    tracing::info!(%project_id, %user_id, "project deleted");
    Ok(Redirect::to(&format!("/users/{user_id}")))
}

fn render_form(
    title: &str,
    action: &str,
    form: &ProjectForm,
    errors: &Vec<FieldError>,
) -> Result<Html<String>, ApiError> {
    let page = ProjectFormTemplate {
        title,
        action,
        form,
        errors,
    };
    render(&page)
}

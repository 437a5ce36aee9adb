//! Admin account management.

use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use uuid::Uuid;

use sl_core::error::{AppError, FieldError};
use sl_core::models::User;
use sl_core::validate::UserForm;
use sl_ui::{ConfirmDeleteTemplate, UserDetailTemplate, UserFormTemplate, UserListTemplate};

use crate::error::{render, ApiError};
use crate::AppState;

async fn load_user(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    Ok(state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))?)
}

pub async fn list(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let mut accounts = Vec::new();
    for user in state.users.list().await? {
        let count = state.projects.count_by_user(user.id).await?;
        accounts.push((user, count));
    }
    let page = UserListTemplate {
        title: "Clients",
        accounts: &accounts,
    };
    render(&page)
}

pub async fn detail(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Html<String>, ApiError> {
    let (account, projects) = tokio::join!(
        state.users.get(user_id),
        state.projects.list_by_user(user_id),
    );
    let account = account?.ok_or_else(|| AppError::not_found("User", user_id))?;
    let projects = projects?;

    let page = UserDetailTemplate {
        title: &account.name,
        account: &account,
        projects: &projects,
        viewer_is_admin: true,
    };
    render(&page)
}

pub async fn update_form(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Html<String>, ApiError> {
    let account = load_user(&state, user_id).await?;
    let form = UserForm {
        name: account.name.clone(),
        email: account.email.clone(),
        secondary_email_one: account.secondary_email_one.clone().unwrap_or_default(),
        secondary_email_two: account.secondary_email_two.clone().unwrap_or_default(),
        phone: account.phone.clone().unwrap_or_default(),
        password: String::new(),
    };
    render_edit_form(user_id, &form, &Vec::new())
}

pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Form(form): Form<UserForm>,
) -> Result<Response, ApiError> {
    // Blank password on edit keeps the current credential.
    let draft = match form.validate(false) {
        Ok(draft) => draft,
        Err(errors) => return Ok(render_edit_form(user_id, &form, &errors)?.into_response()),
    };

    let account = load_user(&state, user_id).await?;
    match state.accounts.update_account(account, draft).await {
        Ok(_) => Ok(Redirect::to(&format!("/users/{user_id}")).into_response()),
        Err(AppError::Conflict(_)) => {
            let errors = vec![FieldError::new(
                "email",
                "An account with this email or phone already exists",
            )];
            Ok(render_edit_form(user_id, &form, &errors)?.into_response())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_form(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Html<String>, ApiError> {
    let account = load_user(&state, user_id).await?;
    let page = ConfirmDeleteTemplate {
        title: "Delete account",
        entity: "account",
        label: &account.name,
        action: &format!("/users/{user_id}/delete"),
        cancel: &format!("/users/{user_id}"),
    };
    render(&page)
}

/// Deletes an account and everything under it. Remote media goes first,
/// project by project, so a media-host failure aborts before any record
/// is lost.
pub async fn delete(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    load_user(&state, user_id).await?;
    for project in state.projects.list_by_user(user_id).await? {
        for image in state.images.list_by_project(project.id).await? {
            state.uploads.remove_image(image.id).await?;
        }
        for file in state.files.list_by_project(project.id).await? {
            state.uploads.remove_file(file.id).await?;
        }
    }
    state.users.delete(user_id).await?;
    tracing::info!(%user_id, "account deleted");
    Ok(Redirect::to("/users"))
}

fn render_edit_form(
    user_id: Uuid,
    form: &UserForm,
    errors: &Vec<FieldError>,
) -> Result<Html<String>, ApiError> {
    let page = UserFormTemplate {
        title: "Edit account",
        action: &format!("/users/{user_id}/update"),
        is_edit: true,
        form,
        errors,
    };
    render(&page)
}

//! Progress photo batches and single-file attachments.

use axum::extract::{Multipart, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use sl_core::error::{AppError, FieldError};
use sl_services::IncomingUpload;
use sl_ui::{FileFormTemplate, ImageFormTemplate};

use crate::error::{render, ApiError};
use crate::handlers::{load_project, project_path};
use crate::AppState;

pub async fn image_form(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    let project = load_project(&state, user_id, project_id).await?;
    let page = ImageFormTemplate {
        title: "Upload photos",
        action: &format!("{}/images", project_path(user_id, project_id)),
        project: &project,
        errors: &Vec::new(),
    };
    render(&page)
}

pub async fn image_upload(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    load_project(&state, user_id, project_id).await?;

    let uploads = collect_uploads(multipart, "images", state.max_batch).await;
    let uploads = match uploads {
        Ok(uploads) if uploads.is_empty() => {
            return image_form_rejected(
                &state,
                user_id,
                project_id,
                vec![FieldError::new("images", "Choose at least one photo")],
            )
            .await;
        }
        Ok(uploads) => uploads,
        Err(errors) => return image_form_rejected(&state, user_id, project_id, errors).await,
    };

    match state.uploads.ingest_images(uploads, project_id).await {
        Ok(outcomes) => {
            let mut errors: Vec<FieldError> = outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
                .map(|(o, e)| {
                    FieldError::new("images", format!("{} was not saved: {e}", o.original_name))
                })
                .collect();
            if errors.is_empty() {
                return Ok(Redirect::to(&project_path(user_id, project_id)).into_response());
            }
            let stored = outcomes.len() - errors.len();
            tracing::warn!(%project_id, failed = errors.len(), stored, "photos in the batch did not persist");
            errors.insert(
                0,
                FieldError::new(
                    "images",
                    format!("{stored} of {} photos were saved", outcomes.len()),
                ),
            );
            image_form_rejected(&state, user_id, project_id, errors).await
        }
        Err(AppError::Validation(errors)) => {
            image_form_rejected(&state, user_id, project_id, errors).await
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn image_delete(
    State(state): State<AppState>,
    Path((_user_id, _project_id, image_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.uploads.remove_image(image_id).await?;
    Ok(Json(json!({ "deleted": image_id })))
}

pub async fn file_form(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Html<String>, ApiError> {
    let project = load_project(&state, user_id, project_id).await?;
    let page = FileFormTemplate {
        title: "Attach a file",
        action: &format!("{}/file/create", project_path(user_id, project_id)),
        project: &project,
        errors: &Vec::new(),
    };
    render(&page)
}

pub async fn file_upload(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    load_project(&state, user_id, project_id).await?;

    let mut uploads = match collect_uploads(multipart, "file", 1).await {
        Ok(uploads) => uploads,
        Err(errors) => return file_form_rejected(&state, user_id, project_id, errors).await,
    };
    let Some(upload) = uploads.pop() else {
        return file_form_rejected(
            &state,
            user_id,
            project_id,
            vec![FieldError::new("file", "Choose a file to upload")],
        )
        .await;
    };

    match state.uploads.ingest_file(upload, project_id).await {
        Ok(_) => Ok(Redirect::to(&project_path(user_id, project_id)).into_response()),
        Err(AppError::Validation(errors)) => {
            file_form_rejected(&state, user_id, project_id, errors).await
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn file_delete(
    State(state): State<AppState>,
    Path((_user_id, _project_id, file_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.uploads.remove_file(file_id).await?;
    Ok(Json(json!({ "deleted": file_id })))
}

/// Drains a multipart body, keeping fields named `field_name` that carry
/// a file. Bails with a field error when the batch cap is exceeded.
async fn collect_uploads(
    mut multipart: Multipart,
    field_name: &str,
    max: usize,
) -> Result<Vec<IncomingUpload>, Vec<FieldError>> {
    let mut uploads = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(vec![FieldError::new(
                    field_name,
                    format!("upload could not be read: {e}"),
                )])
            }
        };
        if field.name() != Some(field_name) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if original_name.is_empty() {
            continue;
        }
        let content_type = field.content_type().unwrap_or("").to_string();
        let data = field.bytes().await.map_err(|e| {
            vec![FieldError::new(
                field_name,
                format!("{original_name} could not be read: {e}"),
            )]
        })?;

        if uploads.len() == max {
            return Err(vec![FieldError::new(
                field_name,
                format!("At most {max} files per upload"),
            )]);
        }
        uploads.push(IncomingUpload {
            original_name,
            content_type,
            data,
        });
    }
    Ok(uploads)
}

async fn image_form_rejected(
    state: &AppState,
    user_id: Uuid,
    project_id: Uuid,
    errors: Vec<FieldError>,
) -> Result<Response, ApiError> {
    let project = load_project(state, user_id, project_id).await?;
    let page = ImageFormTemplate {
        title: "Upload photos",
        action: &format!("{}/images", project_path(user_id, project_id)),
        project: &project,
        errors: &errors,
    };
    Ok(render(&page)?.into_response())
}

async fn file_form_rejected(
    state: &AppState,
    user_id: Uuid,
    project_id: Uuid,
    errors: Vec<FieldError>,
) -> Result<Response, ApiError> {
    let project = load_project(state, user_id, project_id).await?;
    let page = FileFormTemplate {
        title: "Attach a file",
        action: &format!("{}/file/create", project_path(user_id, project_id)),
        project: &project,
        errors: &errors,
    };
    Ok(render(&page)?.into_response())
}

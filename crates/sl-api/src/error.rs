//! Maps [`AppError`] onto HTTP responses.
//!
//! `Unauthenticated` is a redirect to sign-in rather than a hard error;
//! everything else renders the generic error page. Internal detail never
//! reaches the client.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use sl_core::error::AppError;
use sl_ui::ErrorTemplate;

/// Newtype so the response mapping can live here; handlers return
/// `Result<_, ApiError>` and use `?` on anything that yields [`AppError`].
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::Unauthenticated => {
                return Redirect::to("/auth/sign-in").into_response();
            }
            AppError::NotFound(entity, _) => {
                (StatusCode::NOT_FOUND, format!("{entity} not found."))
            }
            AppError::Validation(fields) => {
                let detail = fields
                    .iter()
                    .map(|f| f.message.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                (StatusCode::UNPROCESSABLE_ENTITY, detail)
            }
            AppError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "You do not have access to this page.".to_string(),
            ),
            AppError::Conflict(detail) => (StatusCode::CONFLICT, detail.clone()),
            AppError::Upstream(detail) => {
                tracing::error!(error = %detail, "upstream failure reached the route boundary");
                (
                    StatusCode::BAD_GATEWAY,
                    "A backing service is unavailable. Please try again.".to_string(),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal failure reached the route boundary");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong on our side.".to_string(),
                )
            }
        };

        let page = ErrorTemplate {
            title: "Error",
            status: status.as_u16(),
            message: &message,
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "error template failed to render");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

/// Render shortcut for handlers; a broken template is an internal error.
pub fn render<T: Template>(template: &T) -> Result<Html<String>, ApiError> {
    template
        .render()
        .map(Html)
        .map_err(|e| ApiError(AppError::Internal(format!("template render failed: {e}"))))
}

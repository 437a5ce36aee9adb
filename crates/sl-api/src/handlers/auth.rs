//! Sign-in, sign-out and admin-driven sign-up.

use axum::extract::{Form, State};
use axum::http::header::{HeaderMap, SET_COOKIE};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use sl_core::error::{AppError, FieldError};
use sl_core::validate::UserForm;
use sl_ui::{SignInTemplate, UserFormTemplate};

use crate::error::{render, ApiError};
use crate::guard::{resolve_viewer, session_cookie, session_clear_cookie, session_set_cookie};
use crate::AppState;

/// The one message every sign-in failure renders, regardless of cause.
const SIGN_IN_FAILED: &str = "Invalid username or password";

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn sign_in_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    // Already signed in: straight to the dashboard.
    if resolve_viewer(&state, session_cookie(&headers).as_deref())
        .await?
        .is_some()
    {
        return Ok(Redirect::to("/").into_response());
    }
    let page = SignInTemplate {
        title: "Sign in",
        error: None,
    };
    Ok(render(&page)?.into_response())
}

pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SignInForm>,
) -> Result<Response, ApiError> {
    let Some(user) = state.accounts.authenticate(&form.email, &form.password).await? else {
        tracing::info!("sign-in rejected");
        let page = SignInTemplate {
            title: "Sign in",
            error: Some(SIGN_IN_FAILED),
        };
        return Ok(render(&page)?.into_response());
    };

    // The resume path lives on the anonymous session, which rotation
    // drops; consume it before establishing the authenticated one.
    let cookie = session_cookie(&headers);
    let target = state
        .sessions
        .take_resume_path(cookie.as_deref())
        .unwrap_or_else(|| "/".to_string());
    let cookie_value = state.sessions.sign_in(cookie.as_deref(), user.id);

    tracing::info!(user_id = %user.id, "sign-in succeeded");
    let mut response = Redirect::to(&target).into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, session_set_cookie(&cookie_value));
    Ok(response)
}

pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(cookie) = session_cookie(&headers) {
        state.sessions.sign_out(&cookie);
    }
    let mut response = Redirect::to("/auth/sign-in").into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, session_clear_cookie());
    response
}

pub async fn sign_up_form() -> Result<Html<String>, ApiError> {
    let page = UserFormTemplate {
        title: "Add a client",
        action: "/auth/sign-up",
        is_edit: false,
        form: &UserForm::default(),
        errors: &Vec::new(),
    };
    render(&page)
}

pub async fn sign_up(
    State(state): State<AppState>,
    Form(form): Form<UserForm>,
) -> Result<Response, ApiError> {
    let draft = match form.validate(true) {
        Ok(draft) => draft,
        Err(errors) => return sign_up_rejected(&form, errors),
    };

    match state.accounts.sign_up(draft, false).await {
        Ok(user) => {
            state.notifier.welcome(&user);
            Ok(Redirect::to(&format!("/users/{}", user.id)).into_response())
        }
        Err(AppError::Conflict(_)) => sign_up_rejected(
            &form,
            vec![FieldError::new(
                "email",
                "An account with this email or phone already exists",
            )],
        ),
        Err(err) => Err(err.into()),
    }
}

fn sign_up_rejected(form: &UserForm, errors: Vec<FieldError>) -> Result<Response, ApiError> {
    let page = UserFormTemplate {
        title: "Add a client",
        action: "/auth/sign-up",
        is_edit: false,
        form,
        errors: &errors,
    };
    Ok(render(&page)?.into_response())
}

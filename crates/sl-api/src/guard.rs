//! Per-route access control.
//!
//! Every route declares its [`RouteAccess`] level at the declaration site
//! in `routes.rs`; this middleware enforces it before the handler runs.
//! The gate reads the session and may record a resume path for anonymous
//! visitors; it never touches resources.

use axum::extract::{RawPathParams, Request, State};
use axum::http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use sl_core::error::AppError;
use sl_core::models::User;
use sl_services::SESSION_COOKIE;

use crate::error::ApiError;
use crate::AppState;

/// Access level attached to a route declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    SignedIn,
    /// Path carries a `user_id` segment; allowed when it matches the
    /// principal or the principal is an admin.
    OwnerOrAdmin,
    AdminOnly,
}

/// The resolved account behind the request's session, inserted into
/// request extensions by the gate for handlers to pick up.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Extracts this portal's session cookie value, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// `Set-Cookie` header value for a session cookie.
pub fn session_set_cookie(value: &str) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` header value that clears the session cookie.
pub fn session_clear_cookie() -> HeaderValue {
    HeaderValue::from_static(concat!("sl_session", "=; Path=/; HttpOnly; Max-Age=0"))
}

/// Looks up the signed-in account behind the request cookie, if any.
pub async fn resolve_viewer(
    state: &AppState,
    cookie: Option<&str>,
) -> sl_core::error::Result<Option<User>> {
    let Some(cookie) = cookie else {
        return Ok(None);
    };
    let Some(user_id) = state.sessions.principal(cookie) else {
        return Ok(None);
    };
    state.users.get(user_id).await
}

/// The gate itself, layered per route with its access level as state.
pub async fn check(
    State((state, access)): State<(AppState, RouteAccess)>,
    params: RawPathParams,
    mut req: Request,
    next: Next,
) -> Response {
    if access == RouteAccess::Public {
        return next.run(req).await;
    }

    let cookie = session_cookie(req.headers());
    let viewer = match resolve_viewer(&state, cookie.as_deref()).await {
        Ok(viewer) => viewer,
        Err(err) => return ApiError(err).into_response(),
    };

    let Some(viewer) = viewer else {
        // Remember where they were headed so sign-in can resume there.
        let path = req.uri().path().to_string();
        let cookie_value = state.sessions.remember_path(cookie.as_deref(), &path);
        let mut response = Redirect::to("/auth/sign-in").into_response();
        response
            .headers_mut()
            .append(SET_COOKIE, session_set_cookie(&cookie_value));
        return response;
    };

    let allowed = match access {
        RouteAccess::Public | RouteAccess::SignedIn => true,
        RouteAccess::AdminOnly => viewer.is_admin,
        RouteAccess::OwnerOrAdmin => {
            viewer.is_admin
                || params
                    .iter()
                    .find(|(name, _)| *name == "user_id")
                    .map(|(_, value)| value == viewer.id.to_string().as_str())
                    .unwrap_or(false)
        }
    };
    if !allowed {
        return ApiError(AppError::Forbidden("insufficient role for route".into()))
            .into_response();
    }

    req.extensions_mut().insert(CurrentUser(viewer));
    next.run(req).await
}

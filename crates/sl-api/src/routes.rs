//! Route table. Each group declares its [`RouteAccess`] level where the
//! routes are declared, and the guard middleware enforces it.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::guard::{self, RouteAccess};
use crate::handlers::{auth, comments, dashboard, media, projects, updates, users};
use crate::rate_limit::{self, FixedWindow};
use crate::AppState;

pub struct RateLimits {
    /// Portal-wide fixed window.
    pub general: Arc<FixedWindow>,
    /// Stricter window on the sign-in endpoint.
    pub sign_in: Arc<FixedWindow>,
}

pub fn router(state: AppState, limits: RateLimits, max_body_bytes: usize) -> Router {
    let public = Router::new()
        .route(
            "/auth/sign-in",
            get(auth::sign_in_form)
                .post(auth::sign_in)
                .layer(from_fn_with_state(limits.sign_in, rate_limit::limit)),
        )
        .route("/auth/sign-out", get(auth::sign_out).delete(auth::sign_out));

    let signed_in = Router::new()
        .route("/", get(dashboard::index))
        .route(
            "/users/{user_id}/project/{project_id}/image/{image_id}/comments",
            get(comments::list),
        )
        .route(
            "/users/{user_id}/project/{project_id}/image/{image_id}/comment",
            post(comments::create),
        )
        .route(
            "/users/{user_id}/project/{project_id}/comment/{comment_id}",
            delete(comments::delete),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), RouteAccess::SignedIn),
            guard::check,
        ));

    let owner_or_admin = Router::new()
        .route("/users/{user_id}/project/{project_id}", get(projects::detail))
        .route(
            "/users/{user_id}/project/{project_id}/weekly-updates",
            get(updates::list),
        )
        .route(
            "/users/{user_id}/project/{project_id}/weekly-update/{update_id}",
            get(updates::detail),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), RouteAccess::OwnerOrAdmin),
            guard::check,
        ));

    let admin = Router::new()
        .route("/auth/sign-up", get(auth::sign_up_form).post(auth::sign_up))
        .route("/users", get(users::list))
        .route("/users/{user_id}", get(users::detail))
        .route(
            "/users/{user_id}/update",
            get(users::update_form).post(users::update),
        )
        .route(
            "/users/{user_id}/delete",
            get(users::delete_form).post(users::delete),
        )
        .route(
            "/users/{user_id}/project",
            get(projects::create_form).post(projects::create),
        )
        .route(
            "/users/{user_id}/project/{project_id}/update",
            get(projects::update_form).post(projects::update),
        )
        .route(
            "/users/{user_id}/project/{project_id}/delete",
            get(projects::delete_form).post(projects::delete),
        )
        .route(
            "/users/{user_id}/project/{project_id}/images",
            get(media::image_form).post(media::image_upload),
        )
        .route(
            "/users/{user_id}/project/{project_id}/image/{image_id}/delete",
            post(media::image_delete),
        )
        .route(
            "/users/{user_id}/project/{project_id}/file/create",
            get(media::file_form).post(media::file_upload),
        )
        .route(
            "/users/{user_id}/project/{project_id}/file/{file_id}/delete",
            post(media::file_delete),
        )
        .route(
            "/users/{user_id}/project/{project_id}/weekly-update/create",
            get(updates::create_form).post(updates::create),
        )
        .route(
            "/users/{user_id}/project/{project_id}/weekly-update/{update_id}/update",
            get(updates::edit_form).post(updates::edit),
        )
        .route(
            "/users/{user_id}/project/{project_id}/weekly-update/{update_id}/delete",
            get(updates::delete_form).post(updates::delete),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), RouteAccess::AdminOnly),
            guard::check,
        ));

    Router::new()
        .merge(public)
        .merge(signed_in)
        .merge(owner_or_admin)
        .merge(admin)
        .layer(from_fn_with_state(limits.general, rate_limit::limit))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Server-rendered pages. One template struct per page; handlers in
//! `sl-api` fill these with borrowed domain data and render.

use askama::Template;

use sl_core::error::FieldError;
use sl_core::models::{Image, Project, StoredFile, Update, User};
use sl_core::validate::{ProjectForm, UpdateForm, UserForm};

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub title: &'a str,
    pub viewer: &'a User,
    /// Admin dashboard rows: every account with its project count.
    pub accounts: &'a Vec<(User, i64)>,
    /// Client dashboard rows: the viewer's own projects.
    pub projects: &'a Vec<Project>,
}

#[derive(Template)]
#[template(path = "sign_in.html")]
pub struct SignInTemplate<'a> {
    pub title: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "user_form.html")]
pub struct UserFormTemplate<'a> {
    pub title: &'a str,
    pub action: &'a str,
    /// True on account edit, where a blank password keeps the current one.
    pub is_edit: bool,
    pub form: &'a UserForm,
    pub errors: &'a Vec<FieldError>,
}

#[derive(Template)]
#[template(path = "users.html")]
pub struct UserListTemplate<'a> {
    pub title: &'a str,
    pub accounts: &'a Vec<(User, i64)>,
}

#[derive(Template)]
#[template(path = "user_detail.html")]
pub struct UserDetailTemplate<'a> {
    pub title: &'a str,
    pub account: &'a User,
    pub projects: &'a Vec<Project>,
    pub viewer_is_admin: bool,
}

#[derive(Template)]
#[template(path = "project_form.html")]
pub struct ProjectFormTemplate<'a> {
    pub title: &'a str,
    pub action: &'a str,
    pub form: &'a ProjectForm,
    pub errors: &'a Vec<FieldError>,
}

#[derive(Template)]
#[template(path = "project_detail.html")]
pub struct ProjectDetailTemplate<'a> {
    pub title: &'a str,
    pub project: &'a Project,
    pub owner: &'a User,
    pub latest_update: Option<&'a Update>,
    pub images: &'a Vec<Image>,
    pub files: &'a Vec<StoredFile>,
    pub viewer_is_admin: bool,
}

#[derive(Template)]
#[template(path = "update_form.html")]
pub struct UpdateFormTemplate<'a> {
    pub title: &'a str,
    pub action: &'a str,
    pub form: &'a UpdateForm,
    pub errors: &'a Vec<FieldError>,
}

#[derive(Template)]
#[template(path = "updates.html")]
pub struct UpdateListTemplate<'a> {
    pub title: &'a str,
    pub project: &'a Project,
    pub updates: &'a Vec<Update>,
    pub viewer_is_admin: bool,
}

#[derive(Template)]
#[template(path = "update_detail.html")]
pub struct UpdateDetailTemplate<'a> {
    pub title: &'a str,
    pub project: &'a Project,
    pub update: &'a Update,
    pub viewer_is_admin: bool,
}

#[derive(Template)]
#[template(path = "image_form.html")]
pub struct ImageFormTemplate<'a> {
    pub title: &'a str,
    pub action: &'a str,
    pub project: &'a Project,
    pub errors: &'a Vec<FieldError>,
}

#[derive(Template)]
#[template(path = "file_form.html")]
pub struct FileFormTemplate<'a> {
    pub title: &'a str,
    pub action: &'a str,
    pub project: &'a Project,
    pub errors: &'a Vec<FieldError>,
}

/// Shared confirmation page for user and project deletes.
#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate<'a> {
    pub title: &'a str,
    pub entity: &'a str,
    pub label: &'a str,
    pub action: &'a str,
    pub cancel: &'a str,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub title: &'a str,
    pub status: u16,
    pub message: &'a str,
}

//! Shared harness for router-level tests: an in-memory database, an
//! in-process media host and mailer, and helpers for driving the router
//! with `tower::ServiceExt::oneshot`.

// Each test binary compiles its own copy and uses a different subset.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;
use uuid::Uuid;

use sl_api::rate_limit::FixedWindow;
use sl_api::{AppState, RateLimits};
use sl_core::error::Result;
use sl_core::models::{FileKind, RemoteMedia, User};
use sl_core::traits::{Mailer, MediaHost};
use sl_core::validate::UserForm;
use sl_db_sqlite::SqliteStore;
use sl_services::{AccountService, Notifier, SessionStore, UploadPipeline, SESSION_COOKIE};

pub const ADMIN_PASSWORD: &str = "admin-pass-1";
pub const CLIENT_PASSWORD: &str = "client-pass-1";

/// Media host double: hands out deterministic URLs and records calls.
/// `fail_matching` makes uploads of staged files whose name contains the
/// given substring fail, for partial-batch scenarios.
pub struct FakeMediaHost {
    pub uploaded: Mutex<Vec<(PathBuf, FileKind)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_matching: Mutex<Option<String>>,
}

impl FakeMediaHost {
    pub fn new() -> Self {
        Self {
            uploaded: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_matching: Mutex::new(None),
        }
    }

    pub fn fail_uploads_matching(&self, needle: &str) {
        *self.fail_matching.lock().unwrap() = Some(needle.to_string());
    }
}

#[async_trait]
impl MediaHost for FakeMediaHost {
    async fn upload(&self, path: &Path, kind: FileKind) -> Result<RemoteMedia> {
        if let Some(needle) = self.fail_matching.lock().unwrap().as_deref() {
            if path.to_string_lossy().contains(needle) {
                return Err(sl_core::error::AppError::Upstream(
                    "media host rejected upload: 500".into(),
                ));
            }
        }
        let n = {
            let mut uploaded = self.uploaded.lock().unwrap();
            uploaded.push((path.to_path_buf(), kind));
            uploaded.len()
        };
        Ok(RemoteMedia {
            url: format!("https://media.test/demo/upload/v1/Progress/obj-{n}.jpg"),
            handle: format!("Progress/obj-{n}"),
        })
    }

    async fn delete(&self, handle: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(handle.to_string());
        Ok(())
    }

    fn display_url(&self, url: &str, _kind: FileKind) -> String {
        url.to_string()
    }
}

/// Mailer double recording every dispatched send.
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(Vec<String>, String)>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipients: &[String], subject: &str, _html: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipients.to_vec(), subject.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub router: Router,
    pub state: AppState,
    pub media: Arc<FakeMediaHost>,
    pub mailer: Arc<RecordingMailer>,
    pub admin: User,
    pub client: User,
    pub staging: tempfile::TempDir,
}

impl Harness {
    /// Fresh portal over an in-memory database, with one admin and one
    /// client account already signed up.
    pub async fn new() -> Self {
        let store = Arc::new(
            SqliteStore::connect("sqlite::memory:")
                .await
                .expect("in-memory database"),
        );
        let media = Arc::new(FakeMediaHost::new());
        let mailer = Arc::new(RecordingMailer::new());
        let staging = tempfile::tempdir().expect("staging dir");
        let accounts = Arc::new(AccountService::new(store.clone()));

        let state = AppState {
            users: store.clone(),
            projects: store.clone(),
            images: store.clone(),
            files: store.clone(),
            updates: store.clone(),
            comments: store.clone(),
            accounts: accounts.clone(),
            sessions: Arc::new(SessionStore::new("integration-secret")),
            uploads: Arc::new(UploadPipeline::new(
                store.clone(),
                store.clone(),
                store.clone(),
                media.clone(),
                staging.path(),
                8 << 20,
            )),
            notifier: Arc::new(Notifier::new(mailer.clone(), "http://portal.test")),
            max_batch: 20,
        };

        let limits = RateLimits {
            general: Arc::new(FixedWindow::new(900, 10_000)),
            sign_in: Arc::new(FixedWindow::new(60, 10_000)),
        };
        let router = sl_api::router(state.clone(), limits, 256 << 20);

        let admin = accounts
            .sign_up(
                UserForm {
                    name: "Site Admin".into(),
                    email: "admin@example.com".into(),
                    password: ADMIN_PASSWORD.into(),
                    ..UserForm::default()
                }
                .validate(true)
                .expect("admin form"),
                true,
            )
            .await
            .expect("admin account");
        let client = accounts
            .sign_up(
                UserForm {
                    name: "Casey Client".into(),
                    email: "casey@example.com".into(),
                    secondary_email_one: "casey-work@example.com".into(),
                    password: CLIENT_PASSWORD.into(),
                    ..UserForm::default()
                }
                .validate(true)
                .expect("client form"),
                false,
            )
            .await
            .expect("client account");

        Self {
            router,
            state,
            media,
            mailer,
            admin,
            client,
            staging,
        }
    }

    /// Session cookie header value for an already-authenticated user,
    /// skipping the sign-in form.
    pub fn cookie_for(&self, user_id: Uuid) -> String {
        let value = self.state.sessions.sign_in(None, user_id);
        format!("{SESSION_COOKIE}={value}")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router")
    }
}

pub fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

pub fn post_form(path: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn post_json(path: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

const BOUNDARY: &str = "sl-test-boundary";

/// Builds a multipart request body from (field, filename, content type,
/// bytes) tuples.
pub fn multipart(
    path: &str,
    cookie: &str,
    parts: &[(&str, &str, &str, Bytes)],
) -> Request<Body> {
    let mut body = Vec::new();
    for (field, filename, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .expect("request")
}

/// Small valid PNG for upload fixtures.
pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 110, 70]));
    let mut out = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut out),
        image::ImageFormat::Png,
    )
    .expect("png encode");
    Bytes::from(out)
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn assert_redirect(response: &Response<Body>, target: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response).as_deref(), Some(target));
}

/// Lets detached notification tasks run before asserting on the mailer.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

//! # sl-api
//!
//! The web routing and orchestration layer for the Siteline portal.
//! Handlers coordinate the flow between HTTP requests and the core
//! ports; access control and throttling run as per-route middleware.

pub mod error;
pub mod guard;
pub mod handlers;
pub mod rate_limit;
pub mod routes;

use std::sync::Arc;

use sl_core::traits::{CommentRepo, FileRepo, ImageRepo, ProjectRepo, UpdateRepo, UserRepo};
use sl_services::{AccountService, Notifier, SessionStore, UploadPipeline};

pub use routes::{router, RateLimits};

/// State shared across all routes. Everything is an `Arc` so the router
/// stays cheap to clone per connection.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub projects: Arc<dyn ProjectRepo>,
    pub images: Arc<dyn ImageRepo>,
    pub files: Arc<dyn FileRepo>,
    pub updates: Arc<dyn UpdateRepo>,
    pub comments: Arc<dyn CommentRepo>,
    pub accounts: Arc<AccountService>,
    pub sessions: Arc<SessionStore>,
    pub uploads: Arc<UploadPipeline>,
    pub notifier: Arc<Notifier>,
    /// Upper bound on files accepted in one image batch.
    pub max_batch: usize,
}

//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Repositories are typed CRUD access to the document store; each child
//! entity is owned by exactly one parent and deletes cascade top-down.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CommentWithAuthor, FileKind, Image, ImageComment, Project, RemoteMedia, StoredFile, Update,
    User,
};

/// Account persistence. `delete` cascades to owned projects and their
/// children.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, user: &User) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Sorted by name ascending.
    async fn list(&self) -> Result<Vec<User>>;
    /// Full-document write; last write wins.
    async fn update(&self, user: &User) -> Result<()>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// First admin account, recipient of client-activity notifications.
    async fn find_admin(&self) -> Result<Option<User>>;
}

/// Project persistence. `delete` cascades to images, files, updates and
/// image comments.
#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn create(&self, project: &Project) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Project>>;
    /// Sorted oldest-first, the order the project list renders.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Project>>;
    async fn count_by_user(&self, user_id: Uuid) -> Result<i64>;
    async fn update(&self, project: &Project) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ImageRepo: Send + Sync {
    async fn create(&self, image: &Image) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Image>>;
    /// Sorted newest-first.
    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Image>>;
    /// `NotFound` when the image is already gone; safe to retry.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait FileRepo: Send + Sync {
    async fn create(&self, file: &StoredFile) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<StoredFile>>;
    /// Sorted newest-first.
    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<StoredFile>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait UpdateRepo: Send + Sync {
    async fn create(&self, update: &Update) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Update>>;
    /// Sorted oldest-first (week order).
    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Update>>;
    /// Most recent update for the project detail page.
    async fn latest_for_project(&self, project_id: Uuid) -> Result<Option<Update>>;
    async fn update(&self, update: &Update) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create(&self, comment: &ImageComment) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<ImageComment>>;
    /// Sorted newest-first, joined with author names for rendering.
    async fn list_by_image(&self, image_id: Uuid) -> Result<Vec<CommentWithAuthor>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Remote media host contract. The store is treated as content-addressed
/// blob storage; the portal only keeps URL/handle pairs.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Pushes a staged local file and returns its stable URL plus a
    /// deletion handle.
    async fn upload(&self, path: &Path, kind: FileKind) -> Result<RemoteMedia>;
    /// Deletes the remote object addressed by `handle`.
    async fn delete(&self, handle: &str) -> Result<()>;
    /// Deterministic URL rewrite: inline-view directive for images,
    /// force-download for pdf/document. Idempotent.
    fn display_url(&self, url: &str, kind: FileKind) -> String;
}

/// Transactional email contract. Callers treat sends as best-effort;
/// the dispatcher in sl-services detaches them from the request path.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, html: &str) -> Result<()>;
}

//! # Domain Models
//!
//! These structs represent the core entities of the Siteline client portal.
//! Every entity is keyed by a UUID v4 and foreign references store that id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A portal account. Clients own projects; admins manage everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Display name, normalized to capitalized words on write
    pub name: String,
    /// Primary email, globally unique
    pub email: String,
    pub secondary_email_one: Option<String>,
    pub secondary_email_two: Option<String>,
    /// Canonical display format `(XXX) XXX-XXXX`, unique when present
    pub phone: Option<String>,
    /// Argon2 PHC string, never the plain credential
    pub password_hash: String,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// All reachable addresses for notifications, unset slots dropped.
    pub fn notification_emails(&self) -> Vec<String> {
        let mut out = vec![self.email.clone()];
        for extra in [&self.secondary_email_one, &self.secondary_email_two] {
            if let Some(addr) = extra {
                if !addr.is_empty() {
                    out.push(addr.clone());
                }
            }
        }
        out
    }
}

/// Residential or commercial construction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectKind {
    Residential,
    Commercial,
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Residential => "Residential",
            ProjectKind::Commercial => "Commercial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Residential" => Some(ProjectKind::Residential),
            "Commercial" => Some(ProjectKind::Commercial),
            _ => None,
        }
    }
}

/// A construction job, always owned by exactly one [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub address: String,
    pub description: String,
    pub phase_name: String,
    /// Bounded 1..=100, enforced on write
    pub current_phase: i64,
    pub kind: ProjectKind,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Progress photo stored on the remote media host.
///
/// `url` is the final display URL, with the inline-view transformation
/// already applied at persistence time. `handle` addresses the remote
/// object for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub url: String,
    pub handle: String,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Broad classification of an upload, derived from its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    Pdf,
    Document,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
            FileKind::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(FileKind::Image),
            "pdf" => Some(FileKind::Pdf),
            "document" => Some(FileKind::Document),
            _ => None,
        }
    }

    /// Classifies a declared content type. `None` means unsupported and
    /// the whole upload batch must be rejected.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.starts_with("image/") {
            return Some(FileKind::Image);
        }
        match content_type {
            "application/pdf" => Some(FileKind::Pdf),
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "text/plain" => Some(FileKind::Document),
            _ => None,
        }
    }
}

/// Non-photo attachment (plans, permits, invoices) on the media host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub filename: String,
    pub url: String,
    pub handle: String,
    pub kind: FileKind,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Weekly progress report written by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub id: Uuid,
    /// Positive week number
    pub week: i64,
    pub title: String,
    /// Raw text; may contain embedded line breaks
    pub description: String,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Update {
    /// Description split on line breaks with each line trimmed, the shape
    /// the detail pages render.
    pub fn description_lines(&self) -> Vec<String> {
        if self.description.is_empty() {
            return Vec::new();
        }
        self.description
            .split(['\r', '\n'])
            .filter(|l| !l.is_empty())
            .map(|l| l.trim().to_string())
            .collect()
    }
}

/// Comment attached to a progress photo by any signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageComment {
    pub id: Uuid,
    pub image_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Comment joined with its author's display name for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    pub comment: ImageComment,
    pub author_name: String,
}

/// What the media host hands back for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMedia {
    /// Stable content URL, pre-transformation
    pub url: String,
    /// Opaque deletion handle
    pub handle: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_content_types() {
        assert_eq!(FileKind::from_content_type("image/jpeg"), Some(FileKind::Image));
        assert_eq!(FileKind::from_content_type("image/png"), Some(FileKind::Image));
        assert_eq!(FileKind::from_content_type("application/pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_content_type("text/plain"), Some(FileKind::Document));
        assert_eq!(FileKind::from_content_type("application/zip"), None);
    }

    #[test]
    fn description_lines_trim_and_drop_blanks() {
        let update = Update {
            id: Uuid::new_v4(),
            week: 3,
            title: "Framing".into(),
            description: "  first wall up \r\n\r\n second wall up ".into(),
            project_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        assert_eq!(update.description_lines(), vec!["first wall up", "second wall up"]);
    }

    #[test]
    fn notification_emails_drop_unset_slots() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            secondary_email_one: Some("ada2@example.com".into()),
            secondary_email_two: None,
            phone: None,
            password_hash: String::new(),
            is_admin: false,
            last_login: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.notification_emails(), vec!["ada@example.com", "ada2@example.com"]);
    }
}

//! # Declarative input validation
//!
//! One raw form struct per write route, each with a `validate` method that
//! produces either a typed draft or the full list of field errors. Handlers
//! never read a field that was not validated, and nothing is written until
//! validation passes.

use serde::Deserialize;

use crate::error::FieldError;
use crate::models::{FileKind, ProjectKind};

/// Trims, collapses inner whitespace and capitalizes each word.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalizes a phone number to `(XXX) XXX-XXXX`.
///
/// Accepts any input containing exactly ten digits, or eleven with a
/// leading country code `1`. Returns `None` for anything else.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits: &[char] = match digits.len() {
        10 => &digits,
        11 if digits[0] == '1' => &digits[1..],
        _ => return None,
    };
    let s: String = digits.iter().collect();
    Some(format!("({}) {}-{}", &s[0..3], &s[3..6], &s[6..10]))
}

/// Just enough of an email shape check for form feedback; uniqueness is
/// the database's job.
pub fn looks_like_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

const MAX_TEXT_LEN: usize = 10_000;

/// Sign-up and account-update form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub secondary_email_one: String,
    #[serde(default)]
    pub secondary_email_two: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: String,
}

/// Validated, normalized account input. The password is still plain here;
/// the account service hashes it before anything is persisted.
#[derive(Debug, Clone)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub secondary_email_one: Option<String>,
    pub secondary_email_two: Option<String>,
    pub password: String,
    pub phone: Option<String>,
}

impl UserForm {
    /// `require_password` is false on account update, where an empty
    /// password field means "keep the current credential".
    pub fn validate(&self, require_password: bool) -> Result<UserDraft, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = normalize_name(&self.name);
        if name.is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }

        let email = self.email.trim().to_lowercase();
        if email.is_empty() {
            errors.push(FieldError::new("email", "Email is required"));
        } else if !looks_like_email(&email) {
            errors.push(FieldError::new("email", "Invalid email format"));
        }

        let mut secondary = |field: &str, raw: &str| -> Option<String> {
            let trimmed = raw.trim().to_lowercase();
            if trimmed.is_empty() {
                None
            } else if looks_like_email(&trimmed) {
                Some(trimmed)
            } else {
                errors.push(FieldError::new(field, "Invalid email format"));
                None
            }
        };
        let secondary_email_one = secondary("secondary_email_one", &self.secondary_email_one);
        let secondary_email_two = secondary("secondary_email_two", &self.secondary_email_two);

        let password = self.password.trim().to_string();
        if password.is_empty() {
            if require_password {
                errors.push(FieldError::new("password", "Password is required"));
            }
        } else if password.len() < 6 {
            errors.push(FieldError::new("password", "Password must be at least 6 characters"));
        }

        let phone = if self.phone.trim().is_empty() {
            None
        } else {
            match normalize_phone(&self.phone) {
                Some(canonical) => Some(canonical),
                None => {
                    errors.push(FieldError::new("phone", "Invalid phone number format"));
                    None
                }
            }
        };

        if errors.is_empty() {
            Ok(UserDraft {
                name,
                email,
                secondary_email_one,
                secondary_email_two,
                password,
                phone,
            })
        } else {
            Err(errors)
        }
    }
}

/// Project create/update form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectForm {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub phase_name: String,
    #[serde(default)]
    pub current_phase: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct ProjectDraft {
    pub address: String,
    pub description: String,
    pub phase_name: String,
    pub current_phase: i64,
    pub kind: ProjectKind,
}

impl ProjectForm {
    pub fn validate(&self) -> Result<ProjectDraft, Vec<FieldError>> {
        let mut errors = Vec::new();

        let address = self.address.trim().to_string();
        if address.is_empty() {
            errors.push(FieldError::new("address", "Address is required"));
        }

        let phase_name = self.phase_name.trim().to_string();
        if phase_name.is_empty() {
            errors.push(FieldError::new("phase_name", "Phase name is required"));
        }

        let current_phase = match self.current_phase.trim().parse::<i64>() {
            Ok(n) if (1..=100).contains(&n) => n,
            _ => {
                errors.push(FieldError::new(
                    "current_phase",
                    "Current phase must be between 1 and 100",
                ));
                0
            }
        };

        let kind = match ProjectKind::parse(self.kind.trim()) {
            Some(kind) => kind,
            None => {
                errors.push(FieldError::new("kind", "Invalid project type"));
                ProjectKind::Residential
            }
        };

        let description = self.description.trim().to_string();
        if description.len() > MAX_TEXT_LEN {
            errors.push(FieldError::new("description", "Description is too long"));
        }

        if errors.is_empty() {
            Ok(ProjectDraft {
                address,
                description,
                phase_name,
                current_phase,
                kind,
            })
        } else {
            Err(errors)
        }
    }
}

/// Weekly update create/edit form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateForm {
    #[serde(default)]
    pub week: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct UpdateDraft {
    pub week: i64,
    pub title: String,
    pub description: String,
}

impl UpdateForm {
    pub fn validate(&self) -> Result<UpdateDraft, Vec<FieldError>> {
        let mut errors = Vec::new();

        let week = match self.week.trim().parse::<i64>() {
            Ok(n) if n >= 1 => n,
            _ => {
                errors.push(FieldError::new("week", "Week must be a positive integer"));
                0
            }
        };

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push(FieldError::new("title", "Title is required"));
        }

        let description = self.description.trim_end().to_string();
        if description.len() > MAX_TEXT_LEN {
            errors.push(FieldError::new("description", "Description is too long"));
        }

        if errors.is_empty() {
            Ok(UpdateDraft {
                week,
                title,
                description,
            })
        } else {
            Err(errors)
        }
    }
}

/// Image comment form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<CommentDraft, Vec<FieldError>> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(vec![FieldError::new("text", "Comment text is required")]);
        }
        if text.len() > MAX_TEXT_LEN {
            return Err(vec![FieldError::new("text", "Comment is too long")]);
        }
        Ok(CommentDraft { text })
    }
}

/// Pre-check one uploaded file's declared content type. Used by the upload
/// pipeline to reject the whole batch before any remote call.
pub fn classify_upload(content_type: &str) -> Result<FileKind, FieldError> {
    FileKind::from_content_type(content_type).ok_or_else(|| {
        FieldError::new("files", format!("unsupported file type: {content_type}"))
    })
}

//! # Siteline services
//!
//! Application logic that sits between the HTTP surface and the storage
//! and delivery plugins: account management, session tracking, the media
//! upload pipeline and outbound notifications. Everything here talks to
//! the outside world through the `sl-core` trait ports, so each service
//! is testable against mocks.

pub mod accounts;
pub mod notify;
pub mod session;
pub mod upload;

pub use accounts::AccountService;
pub use notify::Notifier;
pub use session::{SessionStore, SESSION_COOKIE};
pub use upload::{IncomingUpload, UploadOutcome, UploadPipeline};

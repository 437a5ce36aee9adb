//! # Notification dispatcher
//!
//! Best-effort email after a state-changing operation succeeds. The send
//! runs on a detached task so the HTTP response never waits on the relay,
//! and a failed send is logged and swallowed; it never reaches the
//! caller's result path and never rolls back the triggering write. No
//! retries: best-effort is the contract, not an oversight.

use std::sync::Arc;

use sl_core::models::{Project, Update, User};
use sl_core::traits::Mailer;

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    /// Public base URL used to build links back into the portal
    base_url: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, base_url: &str) -> Self {
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };
        Self { mailer, base_url }
    }

    pub fn link_to(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Queues a send and returns immediately. Recipients are deduplicated;
    /// empty addresses are dropped.
    pub fn dispatch(&self, recipients: Vec<String>, subject: String, html: String) {
        let mut seen = Vec::new();
        for addr in recipients {
            if !addr.is_empty() && !seen.contains(&addr) {
                seen.push(addr);
            }
        }
        if seen.is_empty() {
            return;
        }

        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(err) = mailer.send(&seen, &subject, &html).await {
                tracing::warn!(error = %err, subject, "notification send failed");
            }
        });
    }

    pub fn welcome(&self, user: &User) {
        let html = format!(
            "<h1>Welcome to the Siteline client portal, {}!</h1>\
             <p>Your account is ready. Sign in with <strong>{}</strong> and the \
             password you were given to follow your project's progress.</p>\
             <p><a href=\"{}\">Open the portal</a></p>",
            user.name.split(' ').next().unwrap_or(&user.name),
            user.email,
            self.link_to("/auth/sign-in"),
        );
        self.dispatch(
            user.notification_emails(),
            "Your Siteline portal account".to_string(),
            html,
        );
    }

    pub fn project_created(&self, owner: &User, project: &Project) {
        let link = self.link_to(&format!("/users/{}/project/{}", owner.id, project.id));
        let html = format!(
            "<p>Hello {},</p>\
             <p>A project has been set up for {} in your portal.</p>\
             <p><a href=\"{link}\">View your project</a></p>",
            owner.name, project.address,
        );
        self.dispatch(
            owner.notification_emails(),
            "Your project is now in the portal".to_string(),
            html,
        );
    }

    pub fn weekly_update_posted(&self, owner: &User, project: &Project, update: &Update) {
        let link = self.link_to(&format!(
            "/users/{}/project/{}/weekly-updates",
            owner.id, project.id
        ));
        let html = format!(
            "<p>Hello {},</p>\
             <p>Week {} update for {}: {}</p>\
             <p><a href=\"{link}\">Read the full update</a></p>",
            owner.name, update.week, project.address, update.title,
        );
        self.dispatch(
            owner.notification_emails(),
            "New progress update on your project".to_string(),
            html,
        );
    }

    /// Admin commented on a client's photo: tell the owner. Client
    /// commented: tell the admin. Same shape either way.
    pub fn comment_added(
        &self,
        recipient: &User,
        commenter_name: &str,
        project: &Project,
        comment_text: &str,
        anchor: &str,
    ) {
        let link = self.link_to(&format!(
            "/users/{}/project/{}#{anchor}",
            project.user_id, project.id
        ));
        let html = format!(
            "<p>Hello {},</p>\
             <p>{commenter_name} commented on a photo for the project at {}:</p>\
             <blockquote>{comment_text}</blockquote>\
             <p><a href=\"{link}\">View the comment</a></p>",
            recipient.name, project.address,
        );
        self.dispatch(
            recipient.notification_emails(),
            "New comment on a project photo".to_string(),
            html,
        );
    }
}

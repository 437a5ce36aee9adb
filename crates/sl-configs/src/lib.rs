//! # sl-configs
//!
//! Typed configuration for the Siteline binary. Everything ambient the
//! portal needs is declared here and injected explicitly at process start;
//! no module reads the environment on its own.
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `siteline.toml` next to the binary, then `SITELINE_`-prefixed
//! environment variables (`SITELINE_MEDIA__API_KEY=...`).

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Top-level application config.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub media: MediaConfig,
    pub mail: MailConfig,
    pub uploads: UploadConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL used to build links in notification emails
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for the session cookie signature
    pub secret: SecretString,
}

/// Remote media host credentials and namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
    /// Folder namespace all portal uploads land under
    pub folder: String,
}

/// Transactional mail relay credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// HTTP endpoint of the relay's send API
    pub endpoint: String,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Shared local staging directory for in-flight uploads
    pub staging_dir: String,
    pub max_file_bytes: u64,
    /// Upper bound on files per image batch
    pub max_batch: usize,
}

/// Fixed-window rate limits, one general and one stricter for sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub general_window_secs: u64,
    pub general_max: u32,
    pub sign_in_window_secs: u64,
    pub sign_in_max: u32,
}

impl AppConfig {
    /// Loads configuration from defaults, the optional `siteline.toml`
    /// file and the environment. Call `dotenvy::dotenv()` first if a
    /// local `.env` should participate.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.public_base_url", "http://localhost:3000")?
            .set_default("database.url", "sqlite:siteline.db")?
            .set_default("uploads.staging_dir", "uploads")?
            .set_default("uploads.max_file_bytes", 10 * 1024 * 1024_i64)?
            .set_default("uploads.max_batch", 20)?
            .set_default("rate_limit.general_window_secs", 15 * 60)?
            .set_default("rate_limit.general_max", 250)?
            .set_default("rate_limit.sign_in_window_secs", 60)?
            .set_default("rate_limit.sign_in_max", 10)?
            .add_source(config::File::with_name("siteline").required(false))
            .add_source(
                config::Environment::with_prefix("SITELINE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let parsed: AppConfig = cfg.try_deserialize()?;
        tracing::debug!(host = %parsed.server.host, port = parsed.server.port, "configuration loaded");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_required_env() {
        // Only the secrets lack defaults.
        std::env::set_var("SITELINE_SESSION__SECRET", "test-secret");
        std::env::set_var("SITELINE_MEDIA__CLOUD_NAME", "demo");
        std::env::set_var("SITELINE_MEDIA__API_KEY", "key");
        std::env::set_var("SITELINE_MEDIA__API_SECRET", "shh");
        std::env::set_var("SITELINE_MEDIA__FOLDER", "Progress");
        std::env::set_var("SITELINE_MAIL__ENDPOINT", "https://mail.invalid/send");
        std::env::set_var("SITELINE_MAIL__USERNAME", "portal");
        std::env::set_var("SITELINE_MAIL__PASSWORD", "shh");
        std::env::set_var("SITELINE_MAIL__FROM_ADDRESS", "portal@example.com");
    }

    #[test]
    fn defaults_fill_non_secret_fields() {
        set_required_env();
        let cfg = AppConfig::load().expect("load config");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.uploads.max_batch, 20);
        assert_eq!(cfg.rate_limit.sign_in_max, 10);
        // Environment variables reached the nested sections.
        assert_eq!(cfg.media.cloud_name, "demo");
        assert_eq!(cfg.mail.from_address, "portal@example.com");
    }
}

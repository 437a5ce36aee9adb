//! # Siteline binary
//!
//! The entry point that assembles the portal from its plugins: typed
//! config, the SQLite store, the media-host and mail-relay clients, and
//! the axum router, then serves until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use sl_api::rate_limit::FixedWindow;
use sl_api::{AppState, RateLimits};
use sl_configs::AppConfig;
use sl_core::validate::UserForm;
use sl_services::{AccountService, Notifier, SessionStore, UploadPipeline};

#[cfg(feature = "db-sqlite")]
use sl_db_sqlite::SqliteStore;

#[cfg(feature = "media-cloud")]
use sl_media_cloud::{CloudMediaHost, MediaCloudConfig};

#[cfg(feature = "mail-http")]
use sl_mail_http::{HttpMailer, MailRelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    #[cfg(feature = "db-sqlite")]
    let store = SqliteStore::connect(&config.database.url)
        .await
        .context("connecting to the database")?;

    #[cfg(feature = "media-cloud")]
    let media_host = CloudMediaHost::new(MediaCloudConfig {
        cloud_name: config.media.cloud_name.clone(),
        api_key: config.media.api_key.clone(),
        api_secret: config.media.api_secret.expose_secret().to_string(),
        folder: config.media.folder.clone(),
        api_base: None,
    });

    #[cfg(feature = "mail-http")]
    let mailer = HttpMailer::new(MailRelayConfig {
        endpoint: config.mail.endpoint.clone(),
        username: config.mail.username.clone(),
        password: config.mail.password.expose_secret().to_string(),
        from_address: config.mail.from_address.clone(),
    });

    let store = Arc::new(store);
    let media_host = Arc::new(media_host);
    let accounts = Arc::new(AccountService::new(store.clone()));

    let state = AppState {
        users: store.clone(),
        projects: store.clone(),
        images: store.clone(),
        files: store.clone(),
        updates: store.clone(),
        comments: store.clone(),
        accounts: accounts.clone(),
        sessions: Arc::new(SessionStore::new(config.session.secret.expose_secret())),
        uploads: Arc::new(UploadPipeline::new(
            store.clone(),
            store.clone(),
            store.clone(),
            media_host,
            config.uploads.staging_dir.clone(),
            config.uploads.max_file_bytes,
        )),
        notifier: Arc::new(Notifier::new(
            Arc::new(mailer),
            &config.server.public_base_url,
        )),
        max_batch: config.uploads.max_batch,
    };

    bootstrap_admin(&state, &accounts).await?;

    let limits = RateLimits {
        general: Arc::new(FixedWindow::new(
            config.rate_limit.general_window_secs,
            config.rate_limit.general_max,
        )),
        sign_in: Arc::new(FixedWindow::new(
            config.rate_limit.sign_in_window_secs,
            config.rate_limit.sign_in_max,
        )),
    };
    // Batch of originals plus multipart framing overhead.
    let max_body = (config.uploads.max_file_bytes as usize)
        .saturating_mul(config.uploads.max_batch.max(1))
        .saturating_add(1 << 20);

    let app = sl_api::router(state, limits, max_body)
        .into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "siteline portal listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

/// First-run convenience: when no admin account exists and bootstrap
/// credentials are present in the environment, create one so the portal
/// is reachable at all (sign-up itself is admin-only).
async fn bootstrap_admin(state: &AppState, accounts: &AccountService) -> anyhow::Result<()> {
    if state.users.find_admin().await?.is_some() {
        return Ok(());
    }
    let (Ok(email), Ok(password)) = (
        std::env::var("SITELINE_BOOTSTRAP_ADMIN_EMAIL"),
        std::env::var("SITELINE_BOOTSTRAP_ADMIN_PASSWORD"),
    ) else {
        tracing::warn!(
            "no admin account exists; set SITELINE_BOOTSTRAP_ADMIN_EMAIL and \
             SITELINE_BOOTSTRAP_ADMIN_PASSWORD to create one"
        );
        return Ok(());
    };

    let form = UserForm {
        name: std::env::var("SITELINE_BOOTSTRAP_ADMIN_NAME")
            .unwrap_or_else(|_| "Site Admin".to_string()),
        email,
        password,
        ..UserForm::default()
    };
    let draft = form
        .validate(true)
        .map_err(|errors| anyhow::anyhow!("bootstrap admin rejected: {errors:?}"))?;
    let admin = accounts.sign_up(draft, true).await?;
    tracing::info!(admin_id = %admin.id, "bootstrap admin account created");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .unwrap_or_else(|e| tracing::error!(error = %e, "ctrl-c handler failed"));
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "sigterm handler failed"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

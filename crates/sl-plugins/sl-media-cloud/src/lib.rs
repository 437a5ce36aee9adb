//! # sl-media-cloud
//!
//! HTTP client for the remote media host, implementing the `MediaHost`
//! port. Uploads are signed multipart requests; the host answers with a
//! stable content URL and an opaque public id used as the deletion handle.
//!
//! The client is constructed once at process start and injected wherever
//! media access is needed; nothing in here reads ambient environment.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use sl_core::error::{AppError, Result};
use sl_core::models::{FileKind, RemoteMedia};
use sl_core::traits::MediaHost;

/// Transformation directive spliced into image URLs: bound to the portal's
/// display box, fixed quality, format negotiated by the CDN.
pub const IMAGE_TRANSFORMATION: &str = "c_limit,w_1920,h_1080,q_80,f_auto";

/// Force-download directive for non-image files.
pub const ATTACHMENT_DIRECTIVE: &str = "fl_attachment=true";

/// Applies the kind-appropriate URL transformation exactly once.
///
/// This is a deterministic string rewrite of the host's delivery URL, not
/// a re-upload. Idempotent: a URL that already carries the directive is
/// returned unchanged, so double application cannot stack directives.
pub fn apply_transformation(url: &str, kind: FileKind) -> String {
    match kind {
        FileKind::Image => {
            let marker = format!("/upload/{IMAGE_TRANSFORMATION}/");
            if url.contains(&marker) {
                return url.to_string();
            }
            match url.split_once("/upload/") {
                Some((head, tail)) => format!("{head}/upload/{IMAGE_TRANSFORMATION}/{tail}"),
                None => {
                    tracing::warn!(url, "unexpected delivery URL shape, left untransformed");
                    url.to_string()
                }
            }
        }
        FileKind::Pdf | FileKind::Document => {
            if url.contains(ATTACHMENT_DIRECTIVE) {
                url.to_string()
            } else if url.contains('?') {
                format!("{url}&{ATTACHMENT_DIRECTIVE}")
            } else {
                format!("{url}?{ATTACHMENT_DIRECTIVE}")
            }
        }
    }
}

/// Credentials and namespace for one media-host account.
#[derive(Debug, Clone)]
pub struct MediaCloudConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder all portal uploads land under (e.g. "Progress")
    pub folder: String,
    /// Override for tests; defaults to the public API host.
    pub api_base: Option<String>,
}

pub struct CloudMediaHost {
    http: reqwest::Client,
    config: MediaCloudConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudMediaHost {
    pub fn new(config: MediaCloudConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        let base = self
            .config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.cloudinary.com".to_string());
        format!("{base}/v1_1/{}/auto/{action}", self.config.cloud_name)
    }

    /// Request signature: SHA-256 over the sorted parameter string plus
    /// the API secret, as the host's signed-upload scheme requires.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl MediaHost for CloudMediaHost {
    async fn upload(&self, path: &Path, _kind: FileKind) -> Result<RemoteMedia> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Internal(format!("staged file read failed: {e}")))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", &self.config.folder),
            ("timestamp", &timestamp),
        ]);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            )
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.config.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("media host unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "media host rejected upload: {}",
                response.status()
            )));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("malformed media host response: {e}")))?;

        tracing::debug!(handle = %parsed.public_id, "media upload confirmed");
        Ok(RemoteMedia {
            url: parsed.secure_url,
            handle: parsed.public_id,
        })
    }

    async fn delete(&self, handle: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", handle), ("timestamp", &timestamp)]);

        let form = reqwest::multipart::Form::new()
            .text("public_id", handle.to_string())
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("media host unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "media host rejected delete: {}",
                response.status()
            )));
        }

        let parsed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("malformed media host response: {e}")))?;
        // "not found" is fine here: the remote object is gone either way
        // and the caller may now drop the database record.
        if parsed.result != "ok" && parsed.result != "not found" {
            return Err(AppError::Upstream(format!(
                "media host delete failed: {}",
                parsed.result
            )));
        }
        Ok(())
    }

    fn display_url(&self, url: &str, kind: FileKind) -> String {
        apply_transformation(url, kind)
    }
}

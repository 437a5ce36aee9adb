//! # Upload pipeline
//!
//! Receives multipart uploads bound to a project, classifies them,
//! transcodes images, forwards the result to the remote media host and
//! persists one record per confirmed file. Local staging artifacts are
//! removed in every path; the staging directory must never accumulate
//! orphans.
//!
//! A record is written only after the remote upload confirms and returns
//! a URL + handle, so the index never points at a blob that does not
//! exist. The kind-appropriate URL transformation is applied exactly once
//! here, at persistence time; only the final URL is stored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use sl_core::error::{AppError, FieldError, Result};
use sl_core::models::{FileKind, Image, StoredFile};
use sl_core::traits::{FileRepo, ImageRepo, MediaHost, ProjectRepo};
use sl_core::validate::classify_upload;

/// Maximum bounding box for stored images. Smaller originals are never
/// enlarged.
pub const MAX_WIDTH: u32 = 1920;
pub const MAX_HEIGHT: u32 = 1080;
const JPEG_QUALITY: u8 = 80;

/// One file pulled out of a multipart request.
#[derive(Debug, Clone)]
pub struct IncomingUpload {
    pub original_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Per-file status for a batch; a single file's failure never hides the
/// rest of the batch's results.
#[derive(Debug)]
pub struct UploadOutcome {
    pub original_name: String,
    pub result: Result<Image>,
}

pub struct UploadPipeline {
    projects: Arc<dyn ProjectRepo>,
    images: Arc<dyn ImageRepo>,
    files: Arc<dyn FileRepo>,
    host: Arc<dyn MediaHost>,
    staging_dir: PathBuf,
    max_file_bytes: u64,
}

impl UploadPipeline {
    pub fn new(
        projects: Arc<dyn ProjectRepo>,
        images: Arc<dyn ImageRepo>,
        files: Arc<dyn FileRepo>,
        host: Arc<dyn MediaHost>,
        staging_dir: impl Into<PathBuf>,
        max_file_bytes: u64,
    ) -> Self {
        Self {
            projects,
            images,
            files,
            host,
            staging_dir: staging_dir.into(),
            max_file_bytes,
        }
    }

    /// Ingests a batch of progress photos for a project.
    ///
    /// The whole batch is rejected before any staging or remote call when
    /// the project is missing or any file's declared content type is not
    /// an image. After that, files are processed independently and the
    /// caller receives a per-file outcome list.
    pub async fn ingest_images(
        &self,
        uploads: Vec<IncomingUpload>,
        project_id: Uuid,
    ) -> Result<Vec<UploadOutcome>> {
        self.projects
            .get(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project", project_id))?;

        // Whole-batch pre-check: do not partially commit a batch that
        // contains an unsupported type.
        let mut batch_errors = Vec::new();
        for upload in &uploads {
            match classify_upload(&upload.content_type) {
                Ok(FileKind::Image) => {}
                Ok(other) => batch_errors.push(FieldError::new(
                    "images",
                    format!(
                        "{}: only images are accepted here, got {}",
                        upload.original_name,
                        other.as_str()
                    ),
                )),
                Err(err) => batch_errors.push(FieldError::new(
                    "images",
                    format!("{}: {}", upload.original_name, err.message),
                )),
            }
        }
        if !batch_errors.is_empty() {
            return Err(AppError::Validation(batch_errors));
        }

        let mut outcomes = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let original_name = upload.original_name.clone();
            let result = self.process_one_image(upload, project_id).await;
            if let Err(err) = &result {
                tracing::warn!(file = %original_name, error = %err, "image upload failed");
            }
            outcomes.push(UploadOutcome {
                original_name,
                result,
            });
        }
        Ok(outcomes)
    }

    /// Ingests a single attachment (plan, permit, photo) for a project.
    /// Images go through the same transcode step as the batch path.
    pub async fn ingest_file(
        &self,
        upload: IncomingUpload,
        project_id: Uuid,
    ) -> Result<StoredFile> {
        self.projects
            .get(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project", project_id))?;

        let kind = classify_upload(&upload.content_type)
            .map_err(|err| AppError::Validation(vec![err]))?;
        self.check_size(&upload)?;

        let staged = self.stage(&upload).await?;
        let result = self.upload_staged(&staged, kind, &upload.original_name, project_id).await;
        staged.cleanup().await;
        result
    }

    /// Deletes a progress photo: remote object first, database record
    /// second. A remote failure keeps the record so the index and the
    /// backing store never diverge.
    pub async fn remove_image(&self, image_id: Uuid) -> Result<()> {
        let image = self
            .images
            .get(image_id)
            .await?
            .ok_or_else(|| AppError::not_found("Image", image_id))?;
        self.host.delete(&image.handle).await?;
        self.images.delete(image_id).await
    }

    /// Same ordering contract as [`remove_image`], for attachments.
    pub async fn remove_file(&self, file_id: Uuid) -> Result<()> {
        let file = self
            .files
            .get(file_id)
            .await?
            .ok_or_else(|| AppError::not_found("File", file_id))?;
        self.host.delete(&file.handle).await?;
        self.files.delete(file_id).await
    }

    async fn process_one_image(&self, upload: IncomingUpload, project_id: Uuid) -> Result<Image> {
        self.check_size(&upload)?;
        let staged = self.stage(&upload).await?;
        let result = self.upload_staged_image(&staged, project_id).await;
        staged.cleanup().await;
        result
    }

    /// Oversized uploads are rejected before any disk or remote work.
    fn check_size(&self, upload: &IncomingUpload) -> Result<()> {
        if upload.data.len() as u64 > self.max_file_bytes {
            return Err(AppError::field(
                "files",
                &format!(
                    "{} exceeds the {} byte upload limit",
                    upload.original_name, self.max_file_bytes
                ),
            ));
        }
        Ok(())
    }

    /// Writes the original bytes into the shared staging directory under
    /// a collision-free name (millisecond timestamp + sanitized original).
    async fn stage(&self, upload: &IncomingUpload) -> Result<StagedUpload> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| AppError::Internal(format!("staging dir unavailable: {e}")))?;

        let safe_name: String = upload
            .original_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let unique = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().as_simple(),
            safe_name
        );
        let original = self.staging_dir.join(unique);

        tokio::fs::write(&original, &upload.data)
            .await
            .map_err(|e| AppError::Internal(format!("staging write failed: {e}")))?;
        Ok(StagedUpload::new(original))
    }

    async fn upload_staged_image(&self, staged: &StagedUpload, project_id: Uuid) -> Result<Image> {
        // CPU-bound transcode runs before the remote upload so we ship
        // the smaller artifact.
        transcode_image(&staged.original, &staged.compressed).await?;

        let remote = self.host.upload(&staged.compressed, FileKind::Image).await?;
        let image = Image {
            id: Uuid::new_v4(),
            url: self.host.display_url(&remote.url, FileKind::Image),
            handle: remote.handle,
            project_id,
            created_at: Utc::now(),
        };
        self.images.create(&image).await?;
        tracing::info!(image_id = %image.id, project_id = %project_id, "image persisted");
        Ok(image)
    }

    async fn upload_staged(
        &self,
        staged: &StagedUpload,
        kind: FileKind,
        original_name: &str,
        project_id: Uuid,
    ) -> Result<StoredFile> {
        let upload_path: &Path = if kind == FileKind::Image {
            transcode_image(&staged.original, &staged.compressed).await?;
            &staged.compressed
        } else {
            &staged.original
        };

        let remote = self.host.upload(upload_path, kind).await?;
        let file = StoredFile {
            id: Uuid::new_v4(),
            filename: original_name.to_string(),
            url: self.host.display_url(&remote.url, kind),
            handle: remote.handle,
            kind,
            project_id,
            created_at: Utc::now(),
        };
        self.files.create(&file).await?;
        tracing::info!(file_id = %file.id, project_id = %project_id, kind = kind.as_str(), "file persisted");
        Ok(file)
    }
}

/// Paths of one upload's local artifacts. `cleanup` removes whatever
/// exists, in success and failure paths alike.
struct StagedUpload {
    original: PathBuf,
    compressed: PathBuf,
}

impl StagedUpload {
    fn new(original: PathBuf) -> Self {
        let mut compressed = original.clone().into_os_string();
        compressed.push("-compressed.jpg");
        Self {
            original,
            compressed: PathBuf::from(compressed),
        }
    }

    async fn cleanup(&self) {
        for path in [&self.original, &self.compressed] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "staging cleanup failed"),
            }
        }
    }
}

/// Decodes, fits into the bounding box (never enlarging) and re-encodes
/// as JPEG at the fixed quality target. Runs on the blocking pool.
async fn transcode_image(src: &Path, dst: &Path) -> Result<()> {
    let src = src.to_owned();
    let dst = dst.to_owned();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let img = image::open(&src)
            .map_err(|e| AppError::field("files", &format!("unreadable image: {e}")))?;

        let fitted = if img.width() > MAX_WIDTH || img.height() > MAX_HEIGHT {
            // `resize` preserves aspect ratio while fitting inside the box.
            img.resize(MAX_WIDTH, MAX_HEIGHT, image::imageops::FilterType::Lanczos3)
        } else {
            img
        };

        let file = std::fs::File::create(&dst)
            .map_err(|e| AppError::Internal(format!("transcode write failed: {e}")))?;
        let mut writer = std::io::BufWriter::new(file);
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        fitted
            .to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| AppError::Internal(format!("jpeg encode failed: {e}")))
    })
    .await
    .map_err(|e| AppError::Internal(format!("transcode task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use sl_core::models::{Project, ProjectKind, RemoteMedia};
    use std::io::Cursor;
    use std::sync::Mutex;

    mock! {
        Projects {}
        #[async_trait]
        impl ProjectRepo for Projects {
            async fn create(&self, project: &Project) -> Result<()>;
            async fn get(&self, id: Uuid) -> Result<Option<Project>>;
            async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Project>>;
            async fn count_by_user(&self, user_id: Uuid) -> Result<i64>;
            async fn update(&self, project: &Project) -> Result<()>;
            async fn delete(&self, id: Uuid) -> Result<()>;
        }
    }

    mock! {
        Images {}
        #[async_trait]
        impl ImageRepo for Images {
            async fn create(&self, image: &Image) -> Result<()>;
            async fn get(&self, id: Uuid) -> Result<Option<Image>>;
            async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Image>>;
            async fn delete(&self, id: Uuid) -> Result<()>;
        }
    }

    mock! {
        Files {}
        #[async_trait]
        impl FileRepo for Files {
            async fn create(&self, file: &StoredFile) -> Result<()>;
            async fn get(&self, id: Uuid) -> Result<Option<StoredFile>>;
            async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<StoredFile>>;
            async fn delete(&self, id: Uuid) -> Result<()>;
        }
    }

    mock! {
        Host {}
        #[async_trait]
        impl MediaHost for Host {
            async fn upload(&self, path: &Path, kind: FileKind) -> Result<RemoteMedia>;
            async fn delete(&self, handle: &str) -> Result<()>;
            fn display_url(&self, url: &str, kind: FileKind) -> String;
        }
    }

    fn sample_project(id: Uuid) -> Project {
        Project {
            id,
            address: "12 Oak St".into(),
            description: String::new(),
            phase_name: "Framing".into(),
            current_phase: 2,
            kind: ProjectKind::Residential,
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    fn png_upload(name: &str, width: u32, height: u32) -> IncomingUpload {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 90, 60]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        IncomingUpload {
            original_name: name.into(),
            content_type: "image/png".into(),
            data: Bytes::from(bytes),
        }
    }

    fn pipeline(
        projects: MockProjects,
        images: MockImages,
        files: MockFiles,
        host: MockHost,
        staging: &Path,
        max_bytes: u64,
    ) -> UploadPipeline {
        UploadPipeline::new(
            Arc::new(projects),
            Arc::new(images),
            Arc::new(files),
            Arc::new(host),
            staging,
            max_bytes,
        )
    }

    fn staging_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn missing_project_aborts_before_any_file_work() {
        let staging = tempfile::tempdir().unwrap();
        let project_id = Uuid::new_v4();

        let mut projects = MockProjects::new();
        projects
            .expect_get()
            .with(eq(project_id))
            .returning(|_| Ok(None));
        let mut host = MockHost::new();
        host.expect_upload().times(0);
        let mut images = MockImages::new();
        images.expect_create().times(0);

        let pipe = pipeline(projects, images, MockFiles::new(), host, staging.path(), 1 << 20);
        let err = pipe
            .ingest_images(vec![png_upload("a.png", 100, 100)], project_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn unsupported_type_rejects_whole_batch_with_no_partial_commit() {
        let staging = tempfile::tempdir().unwrap();
        let project_id = Uuid::new_v4();

        let mut projects = MockProjects::new();
        projects
            .expect_get()
            .returning(move |id| Ok(Some(sample_project(id))));
        let mut host = MockHost::new();
        host.expect_upload().times(0);
        let mut images = MockImages::new();
        images.expect_create().times(0);

        let pipe = pipeline(projects, images, MockFiles::new(), host, staging.path(), 1 << 20);
        let uploads = vec![
            png_upload("ok.png", 100, 100),
            IncomingUpload {
                original_name: "archive.zip".into(),
                content_type: "application/zip".into(),
                data: Bytes::from_static(b"PK"),
            },
        ];
        let err = pipe.ingest_images(uploads, project_id).await.unwrap_err();
        match err {
            AppError::Validation(fields) => {
                assert!(fields[0].message.contains("unsupported file type"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn oversized_file_fails_alone_without_remote_call() {
        let staging = tempfile::tempdir().unwrap();
        let project_id = Uuid::new_v4();

        let mut projects = MockProjects::new();
        projects
            .expect_get()
            .returning(move |id| Ok(Some(sample_project(id))));
        let mut host = MockHost::new();
        host.expect_upload().times(0);
        let mut images = MockImages::new();
        images.expect_create().times(0);

        // Limit below the encoded PNG size, so the file is oversized.
        let pipe = pipeline(projects, images, MockFiles::new(), host, staging.path(), 16);
        let outcomes = pipe
            .ingest_images(vec![png_upload("big.png", 200, 200)], project_id)
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, Err(AppError::Validation(_))));
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn large_image_is_fitted_into_bounding_box_preserving_aspect() {
        let staging = tempfile::tempdir().unwrap();
        let project_id = Uuid::new_v4();
        let observed = Arc::new(Mutex::new(Vec::<(u32, u32)>::new()));

        let mut projects = MockProjects::new();
        projects
            .expect_get()
            .returning(move |id| Ok(Some(sample_project(id))));

        let mut host = MockHost::new();
        let dims = Arc::clone(&observed);
        host.expect_upload().times(1).returning(move |path, _| {
            let uploaded = image::open(path).unwrap();
            dims.lock().unwrap().push((uploaded.width(), uploaded.height()));
            Ok(RemoteMedia {
                url: "https://res.media.test/demo/upload/v1/Progress/a.jpg".into(),
                handle: "Progress/a".into(),
            })
        });
        host.expect_display_url()
            .returning(|url, _| format!("{}#display", url));

        let mut images = MockImages::new();
        images.expect_create().times(1).returning(|_| Ok(()));

        let pipe = pipeline(projects, images, MockFiles::new(), host, staging.path(), 64 << 20);
        // 4000x1000: wider than the box, aspect 4:1.
        let outcomes = pipe
            .ingest_images(vec![png_upload("wide.png", 4000, 1000)], project_id)
            .await
            .unwrap();
        let image_record = outcomes[0].result.as_ref().unwrap();
        assert!(image_record.url.ends_with("#display"));
        assert_eq!(image_record.handle, "Progress/a");

        let dims = observed.lock().unwrap();
        let (w, h) = dims[0];
        assert!(w <= MAX_WIDTH && h <= MAX_HEIGHT);
        let original_ratio = 4000.0 / 1000.0;
        let stored_ratio = w as f64 / h as f64;
        assert!((original_ratio - stored_ratio).abs() < 0.02);

        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn small_image_is_not_enlarged() {
        let staging = tempfile::tempdir().unwrap();
        let project_id = Uuid::new_v4();
        let observed = Arc::new(Mutex::new(Vec::<(u32, u32)>::new()));

        let mut projects = MockProjects::new();
        projects
            .expect_get()
            .returning(move |id| Ok(Some(sample_project(id))));
        let mut host = MockHost::new();
        let dims = Arc::clone(&observed);
        host.expect_upload().times(1).returning(move |path, _| {
            let uploaded = image::open(path).unwrap();
            dims.lock().unwrap().push((uploaded.width(), uploaded.height()));
            Ok(RemoteMedia {
                url: "https://res.media.test/demo/upload/v1/Progress/s.jpg".into(),
                handle: "Progress/s".into(),
            })
        });
        host.expect_display_url().returning(|url, _| url.to_string());
        let mut images = MockImages::new();
        images.expect_create().times(1).returning(|_| Ok(()));

        let pipe = pipeline(projects, images, MockFiles::new(), host, staging.path(), 64 << 20);
        pipe.ingest_images(vec![png_upload("small.png", 640, 480)], project_id)
            .await
            .unwrap();

        assert_eq!(*observed.lock().unwrap(), vec![(640, 480)]);
    }

    #[tokio::test]
    async fn remote_failure_aborts_that_file_only() {
        let staging = tempfile::tempdir().unwrap();
        let project_id = Uuid::new_v4();

        let mut projects = MockProjects::new();
        projects
            .expect_get()
            .returning(move |id| Ok(Some(sample_project(id))));

        let mut host = MockHost::new();
        let mut call = 0;
        host.expect_upload().times(2).returning(move |_, _| {
            call += 1;
            if call == 1 {
                Err(AppError::Upstream("media host 503".into()))
            } else {
                Ok(RemoteMedia {
                    url: "https://res.media.test/demo/upload/v1/Progress/b.jpg".into(),
                    handle: "Progress/b".into(),
                })
            }
        });
        host.expect_display_url().returning(|url, _| url.to_string());

        // Only the confirmed upload is persisted.
        let mut images = MockImages::new();
        images.expect_create().times(1).returning(|_| Ok(()));

        let pipe = pipeline(projects, images, MockFiles::new(), host, staging.path(), 64 << 20);
        let outcomes = pipe
            .ingest_images(
                vec![png_upload("first.png", 100, 100), png_upload("second.png", 100, 100)],
                project_id,
            )
            .await
            .unwrap();

        assert!(matches!(outcomes[0].result, Err(AppError::Upstream(_))));
        assert!(outcomes[1].result.is_ok());
        assert!(staging_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn remove_keeps_record_when_remote_delete_fails() {
        let image_id = Uuid::new_v4();
        let stored = Image {
            id: image_id,
            url: "https://res.media.test/x.jpg".into(),
            handle: "Progress/x".into(),
            project_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let mut images = MockImages::new();
        let stored_clone = stored.clone();
        images
            .expect_get()
            .with(eq(image_id))
            .returning(move |_| Ok(Some(stored_clone.clone())));
        images.expect_delete().times(0);

        let mut host = MockHost::new();
        host.expect_delete()
            .with(eq("Progress/x"))
            .returning(|_| Err(AppError::Upstream("media host 500".into())));

        let staging = tempfile::tempdir().unwrap();
        let pipe = pipeline(
            MockProjects::new(),
            images,
            MockFiles::new(),
            host,
            staging.path(),
            1 << 20,
        );
        let err = pipe.remove_image(image_id).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn remove_deletes_remote_then_record() {
        let image_id = Uuid::new_v4();
        let stored = Image {
            id: image_id,
            url: "https://res.media.test/x.jpg".into(),
            handle: "Progress/x".into(),
            project_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let mut images = MockImages::new();
        let stored_clone = stored.clone();
        images
            .expect_get()
            .returning(move |_| Ok(Some(stored_clone.clone())));
        images
            .expect_delete()
            .with(eq(image_id))
            .times(1)
            .returning(|_| Ok(()));

        let mut host = MockHost::new();
        host.expect_delete().times(1).returning(|_| Ok(()));

        let staging = tempfile::tempdir().unwrap();
        let pipe = pipeline(
            MockProjects::new(),
            images,
            MockFiles::new(),
            host,
            staging.path(),
            1 << 20,
        );
        pipe.remove_image(image_id).await.unwrap();
    }

    #[tokio::test]
    async fn pdf_attachment_skips_transcode_and_keeps_kind() {
        let staging = tempfile::tempdir().unwrap();
        let project_id = Uuid::new_v4();

        let mut projects = MockProjects::new();
        projects
            .expect_get()
            .returning(move |id| Ok(Some(sample_project(id))));

        let mut host = MockHost::new();
        host.expect_upload()
            .withf(|_, kind| *kind == FileKind::Pdf)
            .times(1)
            .returning(|path, _| {
                // The staged original is shipped untouched.
                let bytes = std::fs::read(path).unwrap();
                assert_eq!(&bytes, b"%PDF-1.7 stub");
                Ok(RemoteMedia {
                    url: "https://res.media.test/raw/plan.pdf".into(),
                    handle: "Progress/plan".into(),
                })
            });
        host.expect_display_url()
            .returning(|url, kind| match kind {
                FileKind::Pdf | FileKind::Document => format!("{url}?fl_attachment=true"),
                FileKind::Image => url.to_string(),
            });

        let mut files = MockFiles::new();
        files.expect_create().times(1).returning(|_| Ok(()));

        let pipe = pipeline(projects, MockImages::new(), files, host, staging.path(), 1 << 20);
        let stored = pipe
            .ingest_file(
                IncomingUpload {
                    original_name: "plan.pdf".into(),
                    content_type: "application/pdf".into(),
                    data: Bytes::from_static(b"%PDF-1.7 stub"),
                },
                project_id,
            )
            .await
            .unwrap();

        assert_eq!(stored.kind, FileKind::Pdf);
        assert_eq!(stored.filename, "plan.pdf");
        assert!(stored.url.contains("fl_attachment=true"));
        assert!(staging_is_empty(staging.path()));
    }
}

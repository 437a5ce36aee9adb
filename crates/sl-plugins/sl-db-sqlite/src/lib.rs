//! # sl-db-sqlite
//!
//! SQLite implementation of every repository port. One store struct owns
//! the pool and implements all six traits; the document store is a single
//! source of truth, so there is no reason to split the connection.
//!
//! Cascade deletes run inside one transaction top-down:
//! User → Project → {Image, File, Update} → ImageComment. No orphan
//! survives a parent delete.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use sl_core::error::{AppError, Result};
use sl_core::models::{
    CommentWithAuthor, FileKind, Image, ImageComment, Project, ProjectKind, StoredFile, Update,
    User,
};
use sl_core::traits::{CommentRepo, FileRepo, ImageRepo, ProjectRepo, UpdateRepo, UserRepo};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects and applies pending migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true);
        // An in-memory database exists per connection, so the pool must
        // not hand out more than one.
        let max = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {e}")))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps driver errors into the domain taxonomy. Unique-constraint
/// violations become `Conflict` so routes can re-display the form.
fn db_err(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return AppError::Conflict(db.message().to_string());
        }
    }
    AppError::Internal(format!("database error: {e}"))
}

// Ids are stored as canonical hyphenated text. A corrupt id cell maps to
// the nil UUID rather than failing the whole page read.
fn parse_id(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}

fn row_to_user(row: &SqliteRow) -> User {
    User {
        id: parse_id(&row.get::<String, _>("id")),
        name: row.get("name"),
        email: row.get("email"),
        secondary_email_one: row.get("secondary_email_one"),
        secondary_email_two: row.get("secondary_email_two"),
        phone: row.get("phone"),
        password_hash: row.get("password_hash"),
        is_admin: row.get("is_admin"),
        last_login: row.get::<Option<DateTime<Utc>>, _>("last_login"),
        created_at: row.get("created_at"),
    }
}

fn row_to_project(row: &SqliteRow) -> Project {
    Project {
        id: parse_id(&row.get::<String, _>("id")),
        address: row.get("address"),
        description: row.get("description"),
        phase_name: row.get("phase_name"),
        current_phase: row.get("current_phase"),
        kind: ProjectKind::parse(&row.get::<String, _>("kind")).unwrap_or(ProjectKind::Residential),
        user_id: parse_id(&row.get::<String, _>("user_id")),
        created_at: row.get("created_at"),
    }
}

fn row_to_image(row: &SqliteRow) -> Image {
    Image {
        id: parse_id(&row.get::<String, _>("id")),
        url: row.get("url"),
        handle: row.get("handle"),
        project_id: parse_id(&row.get::<String, _>("project_id")),
        created_at: row.get("created_at"),
    }
}

fn row_to_file(row: &SqliteRow) -> StoredFile {
    StoredFile {
        id: parse_id(&row.get::<String, _>("id")),
        filename: row.get("filename"),
        url: row.get("url"),
        handle: row.get("handle"),
        kind: FileKind::parse(&row.get::<String, _>("kind")).unwrap_or(FileKind::Document),
        project_id: parse_id(&row.get::<String, _>("project_id")),
        created_at: row.get("created_at"),
    }
}

fn row_to_update(row: &SqliteRow) -> Update {
    Update {
        id: parse_id(&row.get::<String, _>("id")),
        week: row.get("week"),
        title: row.get("title"),
        description: row.get("description"),
        project_id: parse_id(&row.get::<String, _>("project_id")),
        created_at: row.get("created_at"),
    }
}

fn row_to_comment(row: &SqliteRow) -> ImageComment {
    ImageComment {
        id: parse_id(&row.get::<String, _>("id")),
        image_id: parse_id(&row.get::<String, _>("image_id")),
        user_id: parse_id(&row.get::<String, _>("user_id")),
        text: row.get("text"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl UserRepo for SqliteStore {
    async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, secondary_email_one, secondary_email_two, \
             phone, password_hash, is_admin, last_login, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.secondary_email_one)
        .bind(&user.secondary_email_two)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.last_login)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn update(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, secondary_email_one = ?, \
             secondary_email_two = ?, phone = ?, password_hash = ?, is_admin = ? \
             WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.secondary_email_one)
        .bind(&user.secondary_email_two)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User", user.id));
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let uid = id.to_string();

        // Children first, leaves up to the root.
        sqlx::query(
            "DELETE FROM image_comments WHERE image_id IN \
             (SELECT id FROM images WHERE project_id IN \
              (SELECT id FROM projects WHERE user_id = ?))",
        )
        .bind(&uid)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for table in ["images", "files", "updates"] {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE project_id IN \
                 (SELECT id FROM projects WHERE user_id = ?)"
            ))
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        sqlx::query("DELETE FROM image_comments WHERE user_id = ?")
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM projects WHERE user_id = ?")
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User", id));
        }

        tx.commit().await.map_err(db_err)?;
        tracing::info!(user_id = %id, "user deleted with cascade");
        Ok(())
    }

    async fn find_admin(&self) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE is_admin = 1 ORDER BY created_at ASC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_user))
    }
}

#[async_trait]
impl ProjectRepo for SqliteStore {
    async fn create(&self, project: &Project) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (id, address, description, phase_name, current_phase, kind, user_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(project.id.to_string())
        .bind(&project.address)
        .bind(&project.description)
        .bind(&project.phase_name)
        .bind(project.current_phase)
        .bind(project.kind.as_str())
        .bind(project.user_id.to_string())
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_project))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects WHERE user_id = ? ORDER BY created_at ASC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(row_to_project).collect())
    }

    async fn count_by_user(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM projects WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get("n"))
    }

    async fn update(&self, project: &Project) -> Result<()> {
        let result = sqlx::query(
            "UPDATE projects SET address = ?, description = ?, phase_name = ?, \
             current_phase = ?, kind = ? WHERE id = ?",
        )
        .bind(&project.address)
        .bind(&project.description)
        .bind(&project.phase_name)
        .bind(project.current_phase)
        .bind(project.kind.as_str())
        .bind(project.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Project", project.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let pid = id.to_string();

        sqlx::query(
            "DELETE FROM image_comments WHERE image_id IN \
             (SELECT id FROM images WHERE project_id = ?)",
        )
        .bind(&pid)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for table in ["images", "files", "updates"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE project_id = ?"))
                .bind(&pid)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(&pid)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Project", id));
        }

        tx.commit().await.map_err(db_err)?;
        tracing::info!(project_id = %id, "project deleted with cascade");
        Ok(())
    }
}

#[async_trait]
impl ImageRepo for SqliteStore {
    async fn create(&self, image: &Image) -> Result<()> {
        sqlx::query(
            "INSERT INTO images (id, url, handle, project_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(image.id.to_string())
        .bind(&image.url)
        .bind(&image.handle)
        .bind(image.project_id.to_string())
        .bind(image.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Image>> {
        let row = sqlx::query("SELECT * FROM images WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_image))
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Image>> {
        let rows = sqlx::query("SELECT * FROM images WHERE project_id = ? ORDER BY created_at DESC")
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(row_to_image).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM image_comments WHERE image_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Image", id));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl FileRepo for SqliteStore {
    async fn create(&self, file: &StoredFile) -> Result<()> {
        sqlx::query(
            "INSERT INTO files (id, filename, url, handle, kind, project_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(file.id.to_string())
        .bind(&file.filename)
        .bind(&file.url)
        .bind(&file.handle)
        .bind(file.kind.as_str())
        .bind(file.project_id.to_string())
        .bind(file.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredFile>> {
        let row = sqlx::query("SELECT * FROM files WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_file))
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<StoredFile>> {
        let rows = sqlx::query("SELECT * FROM files WHERE project_id = ? ORDER BY created_at DESC")
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(row_to_file).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("File", id));
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateRepo for SqliteStore {
    async fn create(&self, update: &Update) -> Result<()> {
        sqlx::query(
            "INSERT INTO updates (id, week, title, description, project_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(update.id.to_string())
        .bind(update.week)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.project_id.to_string())
        .bind(update.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Update>> {
        let row = sqlx::query("SELECT * FROM updates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_update))
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Update>> {
        let rows = sqlx::query("SELECT * FROM updates WHERE project_id = ? ORDER BY created_at ASC")
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(row_to_update).collect())
    }

    async fn latest_for_project(&self, project_id: Uuid) -> Result<Option<Update>> {
        let row = sqlx::query(
            "SELECT * FROM updates WHERE project_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_update))
    }

    async fn update(&self, update: &Update) -> Result<()> {
        let result =
            sqlx::query("UPDATE updates SET week = ?, title = ?, description = ? WHERE id = ?")
                .bind(update.week)
                .bind(&update.title)
                .bind(&update.description)
                .bind(update.id.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Update", update.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM updates WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Update", id));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepo for SqliteStore {
    async fn create(&self, comment: &ImageComment) -> Result<()> {
        sqlx::query(
            "INSERT INTO image_comments (id, image_id, user_id, text, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(comment.id.to_string())
        .bind(comment.image_id.to_string())
        .bind(comment.user_id.to_string())
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImageComment>> {
        let row = sqlx::query("SELECT * FROM image_comments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(row_to_comment))
    }

    async fn list_by_image(&self, image_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        let rows = sqlx::query(
            "SELECT c.*, u.name AS author_name FROM image_comments c \
             JOIN users u ON u.id = c.user_id \
             WHERE c.image_id = ? ORDER BY c.created_at DESC",
        )
        .bind(image_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .iter()
            .map(|row| CommentWithAuthor {
                comment: row_to_comment(row),
                author_name: row.get("author_name"),
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM image_comments WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Comment", id));
        }
        Ok(())
    }
}

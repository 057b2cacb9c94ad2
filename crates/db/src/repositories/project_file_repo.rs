//! Repository for the `project_files` table (metadata only).

use phasetrack_core::types::DbId;
use sqlx::PgPool;

use crate::models::project_file::{CreateProjectFile, ProjectFile};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, history_id, filename, filepath, uploaded_by, locked_by, \
                       created_at, updated_at";

/// Provides file metadata operations and the advisory lock.
pub struct ProjectFileRepo;

impl ProjectFileRepo {
    /// Register a file against a history entry.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        history_id: DbId,
        uploaded_by: DbId,
        input: &CreateProjectFile,
    ) -> Result<ProjectFile, sqlx::Error> {
        let query = format!(
            "INSERT INTO project_files (project_id, history_id, filename, filepath, uploaded_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectFile>(&query)
            .bind(project_id)
            .bind(history_id)
            .bind(&input.filename)
            .bind(&input.filepath)
            .bind(uploaded_by)
            .fetch_one(pool)
            .await
    }

    /// Find a file by ID, scoped to its history entry.
    pub async fn find_for_entry(
        pool: &PgPool,
        history_id: DbId,
        id: DbId,
    ) -> Result<Option<ProjectFile>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM project_files WHERE id = $1 AND history_id = $2");
        sqlx::query_as::<_, ProjectFile>(&query)
            .bind(id)
            .bind(history_id)
            .fetch_optional(pool)
            .await
    }

    /// List the files attached to an entry, oldest first.
    pub async fn list_for_entry(
        pool: &PgPool,
        history_id: DbId,
    ) -> Result<Vec<ProjectFile>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM project_files WHERE history_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, ProjectFile>(&query)
            .bind(history_id)
            .fetch_all(pool)
            .await
    }

    /// Take the lock for `user_id`. Succeeds if the file is unlocked or
    /// already held by the same user; returns `None` otherwise (or if the
    /// file does not exist). Never waits.
    pub async fn lock(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<ProjectFile>, sqlx::Error> {
        let query = format!(
            "UPDATE project_files SET locked_by = $2
             WHERE id = $1 AND (locked_by IS NULL OR locked_by = $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectFile>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Release the lock. Only the holder may release unless `force` is set.
    /// Returns `None` if the file does not exist or is held by someone else.
    pub async fn unlock(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        force: bool,
    ) -> Result<Option<ProjectFile>, sqlx::Error> {
        let query = format!(
            "UPDATE project_files SET locked_by = NULL
             WHERE id = $1 AND (locked_by IS NULL OR locked_by = $2 OR $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectFile>(&query)
            .bind(id)
            .bind(user_id)
            .bind(force)
            .fetch_optional(pool)
            .await
    }

    /// Delete a file's metadata if it is not locked. Returns `true` if a
    /// row was removed.
    pub async fn delete_unlocked(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM project_files WHERE id = $1 AND locked_by IS NULL")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! File metadata attached to history entries. Bytes live elsewhere.

use phasetrack_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `project_files` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectFile {
    pub id: DbId,
    pub project_id: DbId,
    pub history_id: DbId,
    pub filename: String,
    pub filepath: String,
    pub uploaded_by: Option<DbId>,
    /// Advisory lock holder. Deletes are rejected while set.
    pub locked_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering file metadata. Project, entry and uploader come from
/// the request path and session.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectFile {
    pub filename: String,
    pub filepath: String,
}

//! Repository for the `history_entries` table.

use phasetrack_core::history::STATUS_COMPLETED;
use phasetrack_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::history_entry::{
    AssignmentRow, CreateHistoryEntry, HistoryEntry, HistoryEntryView, UpdateHistoryEntry,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, entry_date, phase, description, assigned_to, status, \
                       created_by, acting_user_id, parent_id, is_reply, is_forward, \
                       author_chain, private_by, pending_parent_completion, created_at, updated_at";

/// Entry columns plus the project and user joins read by list endpoints.
const VIEW_SELECT: &str = "SELECT
        h.id, h.project_id, h.entry_date, h.phase, h.description, h.assigned_to, h.status,
        h.created_by, h.acting_user_id, h.parent_id, h.is_reply, h.is_forward,
        h.author_chain, h.private_by, h.pending_parent_completion, h.created_at, h.updated_at,
        p.factory AS project_factory,
        p.client AS project_client,
        (SELECT u.id FROM users u WHERE u.name = h.assigned_to ORDER BY u.id LIMIT 1)
            AS assignee_id,
        cu.name AS created_by_name,
        au.name AS acting_user_name
     FROM history_entries h
     JOIN projects p ON p.id = h.project_id
     LEFT JOIN users cu ON cu.id = h.created_by
     LEFT JOIN users au ON au.id = h.acting_user_id";

/// Outcome of [`HistoryRepo::delete_unless_locked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDeletion {
    Deleted,
    NotFound,
    /// A file attached to the entry is locked.
    Locked { file_id: DbId, locked_by: DbId },
}

/// Provides persistence for history entries and their lineage.
pub struct HistoryRepo;

impl HistoryRepo {
    /// Insert a plain entry, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateHistoryEntry,
    ) -> Result<HistoryEntry, sqlx::Error> {
        Self::insert(pool, input, false).await
    }

    /// Insert a reply or forward. The row is marked
    /// `pending_parent_completion` until [`HistoryRepo::complete_parent`]
    /// succeeds, so a crash between the two writes is recoverable.
    pub async fn create_linked(
        pool: &PgPool,
        input: &CreateHistoryEntry,
    ) -> Result<HistoryEntry, sqlx::Error> {
        Self::insert(pool, input, input.parent_id.is_some()).await
    }

    async fn insert(
        pool: &PgPool,
        input: &CreateHistoryEntry,
        pending_parent_completion: bool,
    ) -> Result<HistoryEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO history_entries
                (project_id, entry_date, phase, description, assigned_to, status,
                 created_by, acting_user_id, parent_id, is_reply, is_forward,
                 author_chain, pending_parent_completion)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(input.project_id)
            .bind(input.entry_date)
            .bind(&input.phase)
            .bind(&input.description)
            .bind(&input.assigned_to)
            .bind(&input.status)
            .bind(input.created_by)
            .bind(input.acting_user_id)
            .bind(input.parent_id)
            .bind(input.is_reply)
            .bind(input.is_forward)
            .bind(&input.author_chain)
            .bind(pending_parent_completion)
            .fetch_one(pool)
            .await
    }

    /// Find an entry by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM history_entries WHERE id = $1");
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an entry by ID, scoped to a project.
    pub async fn find_in_project(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM history_entries WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// Find an entry with its joins, scoped to a project.
    pub async fn find_view_in_project(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<HistoryEntryView>, sqlx::Error> {
        let query = format!("{VIEW_SELECT} WHERE h.id = $1 AND h.project_id = $2");
        sqlx::query_as::<_, HistoryEntryView>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// All entries of a project with their joins, unfiltered. Ordering is
    /// applied after visibility filtering.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<HistoryEntryView>, sqlx::Error> {
        let query = format!("{VIEW_SELECT} WHERE h.project_id = $1");
        sqlx::query_as::<_, HistoryEntryView>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Every distinct (assignee, project) pair, resolved through
    /// `assigned_to` display names.
    pub async fn list_assignments(pool: &PgPool) -> Result<Vec<AssignmentRow>, sqlx::Error> {
        sqlx::query_as::<_, AssignmentRow>(
            "SELECT DISTINCT u.id AS user_id, p.id AS project_id,
                    p.factory AS project_factory, p.client AS project_client
             FROM history_entries h
             JOIN users u ON u.name = h.assigned_to
             JOIN projects p ON p.id = h.project_id
             ORDER BY u.id, p.id",
        )
        .fetch_all(pool)
        .await
    }

    /// Edit an entry. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateHistoryEntry,
    ) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE history_entries SET
                entry_date = COALESCE($2, entry_date),
                phase = COALESCE($3, phase),
                description = COALESCE($4, description),
                assigned_to = COALESCE($5, assigned_to),
                status = COALESCE($6, status)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(id)
            .bind(input.entry_date)
            .bind(&input.phase)
            .bind(&input.description)
            .bind(&input.assigned_to)
            .bind(&input.status)
            .fetch_optional(pool)
            .await
    }

    /// Set the status of an entry.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: &str,
    ) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE history_entries SET status = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    /// Store a serialized privacy state (`None` makes the entry public).
    pub async fn set_private_by(
        pool: &PgPool,
        id: DbId,
        private_by: Option<&str>,
    ) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE history_entries SET private_by = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(id)
            .bind(private_by)
            .fetch_optional(pool)
            .await
    }

    /// Second step of a reply / forward: mark the parent of `child_id`
    /// Completed and clear the child's pending marker, in one transaction.
    ///
    /// Returns the updated parent, or `None` when nothing was pending (the
    /// step already ran, or the parent has since been deleted; the marker is
    /// cleared in that case too).
    pub async fn complete_parent(
        pool: &PgPool,
        child_id: DbId,
    ) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let pending: Option<(Option<DbId>,)> = sqlx::query_as(
            "SELECT parent_id FROM history_entries
             WHERE id = $1 AND pending_parent_completion
             FOR UPDATE",
        )
        .bind(child_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((parent_id,)) = pending else {
            tx.commit().await?;
            return Ok(None);
        };

        let parent = match parent_id {
            Some(parent_id) => {
                let query = format!(
                    "UPDATE history_entries SET status = $2 WHERE id = $1 RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, HistoryEntry>(&query)
                    .bind(parent_id)
                    .bind(STATUS_COMPLETED)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        sqlx::query(
            "UPDATE history_entries SET pending_parent_completion = false WHERE id = $1",
        )
        .bind(child_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(parent)
    }

    /// Children still waiting for their parent to be completed, last touched
    /// before `older_than`, oldest first.
    pub async fn list_pending_parent_completion(
        pool: &PgPool,
        older_than: Timestamp,
        limit: i64,
    ) -> Result<Vec<HistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM history_entries
             WHERE pending_parent_completion AND updated_at < $1
             ORDER BY updated_at, id
             LIMIT $2"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(older_than)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move a pending child to the back of the sweep queue after a failed
    /// attempt. Returns `false` if the child is no longer pending.
    pub async fn touch_pending(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE history_entries SET updated_at = NOW()
             WHERE id = $1 AND pending_parent_completion",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an entry and its file metadata, unless one of its files is
    /// locked. Children keep existing with `parent_id` cleared.
    pub async fn delete_unless_locked(
        pool: &PgPool,
        id: DbId,
    ) -> Result<EntryDeletion, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Row-lock every attached file so a concurrent lock cannot slip in
        // between the check and the cascade.
        let files: Vec<(DbId, Option<DbId>)> = sqlx::query_as(
            "SELECT id, locked_by FROM project_files
             WHERE history_id = $1
             ORDER BY id
             FOR UPDATE",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        if let Some((file_id, locked_by)) = files
            .into_iter()
            .find_map(|(file_id, locked_by)| locked_by.map(|by| (file_id, by)))
        {
            tx.rollback().await?;
            return Ok(EntryDeletion::Locked { file_id, locked_by });
        }

        let result = sqlx::query("DELETE FROM history_entries WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() > 0 {
            Ok(EntryDeletion::Deleted)
        } else {
            Ok(EntryDeletion::NotFound)
        }
    }
}

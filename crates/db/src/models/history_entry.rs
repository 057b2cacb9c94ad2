//! History entry model, joined views and DTOs.

use phasetrack_core::lineage::{self, EntryKind, LineageSignals};
use phasetrack_core::scope::{Assignment, TaskRecord};
use phasetrack_core::types::{DbId, EntryDate, Timestamp};
use phasetrack_core::visibility::HistoryRecord;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `history_entries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryEntry {
    pub id: DbId,
    pub project_id: DbId,
    pub entry_date: EntryDate,
    pub phase: String,
    pub description: String,
    /// Display name of the assignee.
    pub assigned_to: Option<String>,
    pub status: String,
    pub created_by: Option<DbId>,
    pub acting_user_id: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub is_reply: bool,
    pub is_forward: bool,
    pub author_chain: Option<String>,
    pub private_by: Option<String>,
    pub pending_parent_completion: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl HistoryEntry {
    pub fn lineage_signals(&self) -> LineageSignals<'_> {
        LineageSignals {
            is_reply: self.is_reply,
            is_forward: self.is_forward,
            parent_id: self.parent_id,
            description: &self.description,
            author_chain: self.author_chain.as_deref(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        lineage::classify(&self.lineage_signals())
    }
}

impl HistoryRecord for HistoryEntry {
    fn entry_id(&self) -> DbId {
        self.id
    }
    fn entry_date(&self) -> EntryDate {
        self.entry_date
    }
    fn phase(&self) -> &str {
        &self.phase
    }
    fn status(&self) -> &str {
        &self.status
    }
    fn private_by(&self) -> Option<&str> {
        self.private_by.as_deref()
    }
}

/// A history entry joined with its project and the resolved users, as
/// returned by list queries.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryEntryView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: HistoryEntry,
    #[serde(skip)]
    pub project_factory: Option<String>,
    #[serde(skip)]
    pub project_client: Option<String>,
    /// User whose display name matches `assigned_to`, if any.
    pub assignee_id: Option<DbId>,
    pub created_by_name: Option<String>,
    pub acting_user_name: Option<String>,
}

impl HistoryRecord for HistoryEntryView {
    fn entry_id(&self) -> DbId {
        self.entry.id
    }
    fn entry_date(&self) -> EntryDate {
        self.entry.entry_date
    }
    fn phase(&self) -> &str {
        &self.entry.phase
    }
    fn status(&self) -> &str {
        &self.entry.status
    }
    fn private_by(&self) -> Option<&str> {
        self.entry.private_by.as_deref()
    }
}

impl TaskRecord for HistoryEntryView {
    fn created_by(&self) -> Option<DbId> {
        self.entry.created_by
    }
    fn assignee_id(&self) -> Option<DbId> {
        self.assignee_id
    }
    fn project_factory(&self) -> Option<&str> {
        self.project_factory.as_deref()
    }
    fn project_client(&self) -> Option<&str> {
        self.project_client.as_deref()
    }
}

/// One (user, project) pair linked through an assigned history entry.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub user_id: DbId,
    pub project_id: DbId,
    pub project_factory: Option<String>,
    pub project_client: Option<String>,
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            user_id: row.user_id,
            project_id: row.project_id,
            project_factory: row.project_factory,
            project_client: row.project_client,
        }
    }
}

/// Insert payload. Lineage columns are filled by the caller from
/// [`phasetrack_core::lineage::derive_link`] for replies and forwards.
#[derive(Debug, Clone)]
pub struct CreateHistoryEntry {
    pub project_id: DbId,
    pub entry_date: EntryDate,
    pub phase: String,
    pub description: String,
    pub assigned_to: Option<String>,
    pub status: String,
    pub created_by: Option<DbId>,
    pub acting_user_id: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub is_reply: bool,
    pub is_forward: bool,
    pub author_chain: Option<String>,
}

/// DTO for editing an entry. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHistoryEntry {
    pub entry_date: Option<EntryDate>,
    pub phase: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<String>,
}

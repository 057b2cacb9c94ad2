//! Combines scope predicates with the privacy gate into the lists handed
//! back to callers, and owns their ordering.
//!
//! History is ordered by `(date desc, id desc)`: entries on the same day
//! appear newest-created first. The per-phase summary is always derived from
//! the already filtered rows.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::privacy;
use crate::scope::{
    AssignmentIndex, ProjectPredicate, ProjectRecord, TaskPredicate, TaskRecord, UserPredicate,
    UserRecord,
};
use crate::types::{DbId, EntryDate};
use crate::viewer::Viewer;

/// Fields of a history entry the compositor reads.
pub trait HistoryRecord {
    fn entry_id(&self) -> DbId;
    fn entry_date(&self) -> EntryDate;
    fn phase(&self) -> &str;
    fn status(&self) -> &str;
    fn private_by(&self) -> Option<&str>;
}

/// A filtered, ordered history list.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryListing<T> {
    pub entries: Vec<T>,
    /// Latest visible entry per phase (max date, ties by max id).
    pub latest_per_phase: BTreeMap<String, T>,
}

impl<T> Default for HistoryListing<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            latest_per_phase: BTreeMap::new(),
        }
    }
}

fn sort_key<T: HistoryRecord>(row: &T) -> (Reverse<EntryDate>, Reverse<DbId>) {
    (Reverse(row.entry_date()), Reverse(row.entry_id()))
}

/// Sort in place by `(date desc, id desc)`.
pub fn sort_history<T: HistoryRecord>(rows: &mut [T]) {
    rows.sort_by_key(sort_key);
}

/// Filter `rows` by the task predicate and the privacy gate, sort them and
/// compute the per-phase summary.
///
/// `predicate` is `None` when the viewer holds no usable read grant on the
/// page; the result is then empty rather than partial.
pub fn list_history<T>(
    rows: Vec<T>,
    viewer: &Viewer,
    predicate: Option<&TaskPredicate>,
) -> HistoryListing<T>
where
    T: HistoryRecord + TaskRecord + Clone,
{
    let Some(predicate) = predicate else {
        return HistoryListing::default();
    };

    let mut entries: Vec<T> = rows
        .into_iter()
        .filter(|row| predicate.matches(row))
        .filter(|row| privacy::is_visible(row.private_by(), viewer.id))
        .collect();
    sort_history(&mut entries);

    let latest_per_phase = latest_per_phase(&entries);
    HistoryListing {
        entries,
        latest_per_phase,
    }
}

/// For each phase among `rows`, the entry with the greatest `(date, id)`.
pub fn latest_per_phase<T: HistoryRecord + Clone>(rows: &[T]) -> BTreeMap<String, T> {
    let mut latest: BTreeMap<String, T> = BTreeMap::new();
    for row in rows {
        match latest.get(row.phase()) {
            Some(current)
                if (current.entry_date(), current.entry_id())
                    >= (row.entry_date(), row.entry_id()) => {}
            _ => {
                latest.insert(row.phase().to_string(), row.clone());
            }
        }
    }
    latest
}

/// Status information a project summary may show to a viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseStatusSummary {
    /// Phase and status of the most recent status-visible entry.
    pub active_phase: Option<String>,
    pub active_status: Option<String>,
    /// Status of the most recent status-visible entry per phase.
    pub phase_statuses: BTreeMap<String, String>,
}

/// Build the status summary from `rows`, admitting only entries whose
/// status is visible to `viewer` through [`privacy::status_visible_for`].
pub fn phase_status_summary<T>(rows: &[T], viewer: &Viewer) -> PhaseStatusSummary
where
    T: HistoryRecord + Clone,
{
    let mut visible: Vec<T> = rows
        .iter()
        .filter(|row| privacy::status_visible_for(row.private_by(), viewer.id))
        .cloned()
        .collect();
    sort_history(&mut visible);

    let phase_statuses = latest_per_phase(&visible)
        .into_iter()
        .map(|(phase, row)| (phase, row.status().to_string()))
        .collect();

    PhaseStatusSummary {
        active_phase: visible.first().map(|r| r.phase().to_string()),
        active_status: visible.first().map(|r| r.status().to_string()),
        phase_statuses,
    }
}

/// Keep the projects `predicate` admits, preserving order.
pub fn filter_projects<P: ProjectRecord>(
    rows: Vec<P>,
    predicate: &ProjectPredicate,
    index: &AssignmentIndex,
) -> Vec<P> {
    rows.into_iter()
        .filter(|p| predicate.matches(p, index))
        .collect()
}

/// Keep the team members `predicate` admits, preserving order.
pub fn filter_users<U: UserRecord>(
    rows: Vec<U>,
    predicate: &UserPredicate,
    index: &AssignmentIndex,
) -> Vec<U> {
    rows.into_iter()
        .filter(|u| predicate.matches(u, index))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Privacy of history entries.
//!
//! An entry is either public or private to an owner plus a shared list. The
//! state lives in the `private_by` column as comma-joined user ids, owner
//! first: `"4"` is private to user 4 alone, `"4,9,12"` is owned by 4 and
//! shared with 9 and 12.
//!
//! Trust boundary: [`PrivacyState::make_private`] and
//! [`PrivacyState::make_public`] do not look at who is calling. Callers must
//! run [`authorize_transition`] first; the HTTP handler does so before any
//! write.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::DbId;
use crate::viewer::Viewer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PrivacyState {
    Public,
    Private {
        owner: DbId,
        /// Never contains the owner.
        shared_with: BTreeSet<DbId>,
    },
}

impl PrivacyState {
    /// Parse a `private_by` column value. Blank means public.
    pub fn parse(private_by: Option<&str>) -> Result<Self, CoreError> {
        let Some(raw) = private_by.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(PrivacyState::Public);
        };

        let mut ids = raw.split(',').map(|part| {
            part.trim().parse::<DbId>().map_err(|_| {
                CoreError::Validation(format!("Malformed private_by value '{raw}'"))
            })
        });

        let owner = match ids.next() {
            Some(id) => id?,
            None => return Ok(PrivacyState::Public),
        };
        let mut shared_with = BTreeSet::new();
        for id in ids {
            let id = id?;
            if id != owner {
                shared_with.insert(id);
            }
        }
        Ok(PrivacyState::Private { owner, shared_with })
    }

    /// Render for the `private_by` column. `None` means public.
    pub fn to_column(&self) -> Option<String> {
        match self {
            PrivacyState::Public => None,
            PrivacyState::Private { owner, shared_with } => Some(
                std::iter::once(owner)
                    .chain(shared_with.iter())
                    .map(DbId::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }

    pub fn make_private(owner: DbId, shared_with: impl IntoIterator<Item = DbId>) -> Self {
        PrivacyState::Private {
            owner,
            shared_with: shared_with.into_iter().filter(|id| *id != owner).collect(),
        }
    }

    pub fn make_public() -> Self {
        PrivacyState::Public
    }

    /// The state after user `id` has been deleted. The id leaves the shared
    /// list; a deleted owner is replaced by the lowest remaining shared id,
    /// and an entry with nobody left becomes public.
    pub fn without_user(self, id: DbId) -> Self {
        match self {
            PrivacyState::Public => PrivacyState::Public,
            PrivacyState::Private {
                owner,
                mut shared_with,
            } => {
                shared_with.remove(&id);
                if owner != id {
                    return PrivacyState::Private { owner, shared_with };
                }
                match shared_with.pop_first() {
                    Some(next_owner) => PrivacyState::Private {
                        owner: next_owner,
                        shared_with,
                    },
                    None => PrivacyState::Public,
                }
            }
        }
    }

    pub fn owner(&self) -> Option<DbId> {
        match self {
            PrivacyState::Public => None,
            PrivacyState::Private { owner, .. } => Some(*owner),
        }
    }

    pub fn shared_with(&self) -> Option<&BTreeSet<DbId>> {
        match self {
            PrivacyState::Public => None,
            PrivacyState::Private { shared_with, .. } => Some(shared_with),
        }
    }

    /// Every user id referenced by this state (owner and shared list).
    pub fn referenced_users(&self) -> Vec<DbId> {
        match self {
            PrivacyState::Public => Vec::new(),
            PrivacyState::Private { owner, shared_with } => std::iter::once(*owner)
                .chain(shared_with.iter().copied())
                .collect(),
        }
    }

    pub fn permits(&self, viewer_id: DbId) -> bool {
        match self {
            PrivacyState::Public => true,
            PrivacyState::Private { owner, shared_with } => {
                *owner == viewer_id || shared_with.contains(&viewer_id)
            }
        }
    }
}

/// Whether `viewer_id` may see an entry with this `private_by` value.
/// Malformed values hide the entry from everyone.
pub fn is_visible(private_by: Option<&str>, viewer_id: DbId) -> bool {
    PrivacyState::parse(private_by).is_ok_and(|state| state.permits(viewer_id))
}

/// Whether the entry's status may feed aggregate views (project summaries)
/// for `viewer_id`. Evaluated on its own so an entry hidden from a list can
/// never leak its status through a summary.
pub fn status_visible_for(private_by: Option<&str>, viewer_id: DbId) -> bool {
    match PrivacyState::parse(private_by) {
        Ok(PrivacyState::Public) => true,
        Ok(state @ PrivacyState::Private { .. }) => state.permits(viewer_id),
        Err(_) => false,
    }
}

/// Check that `caller` may change the privacy of an entry.
///
/// Allowed: elevated roles, the current privacy owner, or (for a public
/// entry) the entry's owner of record.
pub fn authorize_transition(
    entry_id: DbId,
    entry_created_by: Option<DbId>,
    current: &PrivacyState,
    caller: &Viewer,
) -> Result<(), CoreError> {
    if caller.is_elevated() {
        return Ok(());
    }
    let owner = current.owner().or(entry_created_by);
    if owner == Some(caller.id) {
        Ok(())
    } else {
        Err(CoreError::PrivacyUnauthorized { entry_id })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

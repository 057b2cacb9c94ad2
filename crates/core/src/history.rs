//! History entry constants and validation functions.
//!
//! Shared by the DB and API layers so that statuses, length limits and the
//! draft validation rules stay in one place.

use serde::Deserialize;
use validator::Validate;

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

pub const STATUS_IN_PROGRESS: &str = "In Progress";
pub const STATUS_COMPLETED: &str = "Completed";
pub const STATUS_ON_HOLD: &str = "On Hold";
pub const STATUS_ARCHIVED: &str = "Archived";

/// All valid history entry statuses, in display order.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_IN_PROGRESS,
    STATUS_COMPLETED,
    STATUS_ON_HOLD,
    STATUS_ARCHIVED,
];

/// Maximum length of a history entry description. Mirrored in the
/// `EntryFields` validation attribute below.
pub const MAX_DESCRIPTION_LENGTH: usize = 20_000;

/* --------------------------------------------------------------------------
Draft validation
-------------------------------------------------------------------------- */

/// The user-editable fields of a history entry, checked before any write.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EntryFields {
    #[validate(length(min = 1, max = 200, message = "phase must be 1-200 characters"))]
    pub phase: String,
    #[validate(length(max = 20000, message = "description is too long"))]
    pub description: String,
    #[validate(length(max = 200, message = "assigned_to is too long"))]
    pub assigned_to: Option<String>,
    pub status: String,
}

/// Validate that a status string is one of the accepted values.
pub fn validate_status(status: &str) -> Result<(), CoreError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid status '{status}'. Must be one of: {}",
            VALID_STATUSES.join(", ")
        )))
    }
}

/// Validate a full set of entry fields (lengths and status).
pub fn validate_entry_fields(fields: &EntryFields) -> Result<(), CoreError> {
    fields
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    if fields.phase.trim().is_empty() {
        return Err(CoreError::Validation("phase must not be blank".to_string()));
    }
    validate_status(&fields.status)
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(phase: &str, status: &str) -> EntryFields {
        EntryFields {
            phase: phase.to_string(),
            description: "Prototype review".to_string(),
            assigned_to: Some("Dana".to_string()),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_valid_statuses_accepted() {
        for status in VALID_STATUSES {
            assert!(validate_status(status).is_ok());
        }
    }

    #[test]
    fn test_status_is_case_sensitive() {
        assert!(validate_status("completed").is_err());
        assert!(validate_status("").is_err());
    }

    #[test]
    fn test_entry_fields_ok() {
        assert!(validate_entry_fields(&fields("Design", STATUS_ON_HOLD)).is_ok());
    }

    #[test]
    fn test_blank_phase_rejected() {
        assert!(validate_entry_fields(&fields("", STATUS_IN_PROGRESS)).is_err());
        assert!(validate_entry_fields(&fields("   ", STATUS_IN_PROGRESS)).is_err());
    }

    #[test]
    fn test_overlong_description_rejected() {
        let mut f = fields("Design", STATUS_IN_PROGRESS);
        f.description = "x".repeat(MAX_DESCRIPTION_LENGTH + 1);
        let err = validate_entry_fields(&f).unwrap_err();
        assert!(err.to_string().contains("description is too long"));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = validate_entry_fields(&fields("Design", "Done")).unwrap_err();
        assert!(err.to_string().contains("Invalid status 'Done'"));
    }
}

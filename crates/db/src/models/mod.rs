//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches, where the
//!   entity is editable
//!
//! Entities that the scope resolver filters implement the matching record
//! trait from `phasetrack_core::scope`.

pub mod history_entry;
pub mod permission;
pub mod project;
pub mod project_file;
pub mod user;

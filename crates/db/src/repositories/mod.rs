//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod history_repo;
pub mod permission_repo;
pub mod project_file_repo;
pub mod project_repo;
pub mod user_repo;

pub use history_repo::{EntryDeletion, HistoryRepo};
pub use permission_repo::PermissionRepo;
pub use project_file_repo::ProjectFileRepo;
pub use project_repo::ProjectRepo;
pub use user_repo::UserRepo;

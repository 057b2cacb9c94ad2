pub mod auth;
pub mod files;
pub mod history;
pub mod me;
pub mod permissions;
pub mod privacy;
pub mod project;
pub mod team_member;

//! Request extractors for authentication.
//!
//! - [`auth::AuthUser`] -- the user id from a JWT Bearer token.
//! - [`auth::CurrentViewer`] -- the full [`Viewer`](phasetrack_core::viewer::Viewer)
//!   loaded from the database, passed explicitly to every permission check.

pub mod auth;

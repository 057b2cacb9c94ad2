//! Query parameter types shared by handlers.

use serde::Deserialize;

/// `GET /projects/{id}/history?includeUserName=true`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryListParams {
    /// Attach creator and acting-user display names to each entry.
    #[serde(default, rename = "includeUserName")]
    pub include_user_name: bool,
}

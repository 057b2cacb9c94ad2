//! Project entity model and DTOs.

use chrono::NaiveDate;
use phasetrack_core::scope::ProjectRecord;
use phasetrack_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A project row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub factory: Option<String>,
    pub model_number: String,
    pub factory_model_number: Option<String>,
    pub product_kind: Option<String>,
    pub client: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProjectRecord for Project {
    fn project_id(&self) -> DbId {
        self.id
    }
    fn factory(&self) -> Option<&str> {
        self.factory.as_deref()
    }
    fn client(&self) -> Option<&str> {
        self.client.as_deref()
    }
    fn created_by(&self) -> Option<DbId> {
        self.created_by
    }
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub factory: Option<String>,
    pub model_number: String,
    pub factory_model_number: Option<String>,
    pub product_kind: Option<String>,
    pub client: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Defaults to `In Progress` if omitted.
    pub status: Option<String>,
}

/// DTO for updating an existing project. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub factory: Option<String>,
    pub model_number: Option<String>,
    pub factory_model_number: Option<String>,
    pub product_kind: Option<String>,
    pub client: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
}

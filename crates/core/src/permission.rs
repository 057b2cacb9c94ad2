//! Permission grant model: pages, actions, scopes and the stored
//! `properties` payload.
//!
//! Grants are persisted as one row per `(user, page, action)` with the
//! properties kept as JSON text. That text is parsed exactly once, here, into
//! the [`GrantProperties`] tagged union so the resolver never has to look at
//! loose JSON. The serialised form is kept byte-compatible with grants
//! written by earlier versions of the application:
//!
//! ```text
//! true                                                  (Configuration read)
//! {"enabled":true}                                      (CRUD read, create/update/delete)
//! {"enabled":true,"scope":"own-factory"}
//! {"enabled":true,"scope":"specific-users","userIds":[3,7]}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::types::DbId;

/// Name of the synthetic page whose read grant toggles the permissions
/// admin UI. It is a capability flag, not a row filter.
pub const CRUD_VISIBLE: Page = Page::Crud;

// ---------------------------------------------------------------------------
// Pages and actions
// ---------------------------------------------------------------------------

/// The closed set of pages a grant can target. Adding a page requires a new
/// branch in the scope resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Page {
    Projects,
    Users,
    Tasks,
    #[serde(rename = "CRUD")]
    Crud,
    Configuration,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Projects,
        Page::Users,
        Page::Tasks,
        Page::Crud,
        Page::Configuration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Page::Projects => "Projects",
            Page::Users => "Users",
            Page::Tasks => "Tasks",
            Page::Crud => "CRUD",
            Page::Configuration => "Configuration",
        }
    }

    /// Whether read grants on this page carry a row scope.
    pub fn is_row_scoped(self) -> bool {
        matches!(self, Page::Projects | Page::Users | Page::Tasks)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Page {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Page::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown permission page '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown permission action '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// Which rows a read grant exposes. The list variants carry the user ids
/// they were configured with; an empty list is kept as-is so the resolver
/// can fail closed on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Own,
    OwnFactory,
    AllFactories,
    OwnClient,
    AllClients,
    SpecificUsers(Vec<DbId>),
    UserProjects(Vec<DbId>),
    UserTasks(Vec<DbId>),
    None,
}

impl Scope {
    /// Parse a stored scope name. `user_ids` is only consulted for the list
    /// scopes. Unknown names are a configuration error.
    pub fn parse(name: &str, user_ids: Option<Vec<DbId>>) -> Result<Self, CoreError> {
        let ids = || user_ids.clone().unwrap_or_default();
        Ok(match name {
            "all" => Scope::All,
            "own" => Scope::Own,
            "own-factory" => Scope::OwnFactory,
            "all-factories" => Scope::AllFactories,
            "own-client" => Scope::OwnClient,
            "all-clients" => Scope::AllClients,
            "specific-users" => Scope::SpecificUsers(ids()),
            "user-projects" => Scope::UserProjects(ids()),
            "user-tasks" => Scope::UserTasks(ids()),
            "none" => Scope::None,
            other => {
                return Err(CoreError::InvalidScope(format!(
                    "unrecognized scope '{other}'"
                )))
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::Own => "own",
            Scope::OwnFactory => "own-factory",
            Scope::AllFactories => "all-factories",
            Scope::OwnClient => "own-client",
            Scope::AllClients => "all-clients",
            Scope::SpecificUsers(_) => "specific-users",
            Scope::UserProjects(_) => "user-projects",
            Scope::UserTasks(_) => "user-tasks",
            Scope::None => "none",
        }
    }

    /// The configured user ids for list scopes, `None` for every other scope.
    pub fn user_ids(&self) -> Option<&[DbId]> {
        match self {
            Scope::SpecificUsers(ids) | Scope::UserProjects(ids) | Scope::UserTasks(ids) => {
                Some(ids)
            }
            _ => None,
        }
    }

    /// A list scope saved without any user ids. Resolves to nothing.
    pub fn is_misconfigured(&self) -> bool {
        self.user_ids().is_some_and(|ids| ids.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Grant properties
// ---------------------------------------------------------------------------

/// Parsed form of the `properties` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantProperties {
    /// A bare on/off switch (Configuration, CRUD and non-read actions).
    Flag { enabled: bool },
    /// A read grant over rows of a page.
    Scoped { enabled: bool, scope: Scope },
}

/// Wire shape accepted when reading stored payloads or admin input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawProperties {
    Bare(bool),
    Object {
        enabled: bool,
        #[serde(default)]
        scope: Option<String>,
        #[serde(default, rename = "userIds")]
        user_ids: Option<Vec<DbId>>,
    },
}

impl GrantProperties {
    pub fn enabled(&self) -> bool {
        match self {
            GrantProperties::Flag { enabled } | GrantProperties::Scoped { enabled, .. } => {
                *enabled
            }
        }
    }

    pub fn scope(&self) -> Option<&Scope> {
        match self {
            GrantProperties::Scoped { scope, .. } => Some(scope),
            GrantProperties::Flag { .. } => None,
        }
    }

    /// Parse an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let raw: RawProperties = serde_json::from_value(value)
            .map_err(|e| CoreError::InvalidScope(format!("malformed grant payload: {e}")))?;
        match raw {
            RawProperties::Bare(enabled) => Ok(GrantProperties::Flag { enabled }),
            RawProperties::Object {
                enabled,
                scope: None,
                ..
            } => Ok(GrantProperties::Flag { enabled }),
            RawProperties::Object {
                enabled,
                scope: Some(name),
                user_ids,
            } => Ok(GrantProperties::Scoped {
                enabled,
                scope: Scope::parse(&name, user_ids)?,
            }),
        }
    }

    /// Parse the JSON text stored in `user_permissions.properties`.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::InvalidScope(format!("grant payload is not JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Render the payload for `page`. Configuration flags are written as a
    /// bare boolean; everything else as an object.
    pub fn to_value(&self, page: Page) -> Value {
        match self {
            GrantProperties::Flag { enabled } if page == Page::Configuration => json!(enabled),
            GrantProperties::Flag { enabled } => json!({ "enabled": enabled }),
            GrantProperties::Scoped { enabled, scope } => match scope.user_ids() {
                Some(ids) => json!({ "enabled": enabled, "scope": scope.name(), "userIds": ids }),
                None => json!({ "enabled": enabled, "scope": scope.name() }),
            },
        }
    }

    pub fn to_json_text(&self, page: Page) -> String {
        self.to_value(page).to_string()
    }
}

/// A parsed `(user, page, action)` grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub user_id: DbId,
    pub page: Page,
    pub action: Action,
    pub properties: GrantProperties,
}

impl Grant {
    pub fn enabled(&self) -> bool {
        self.properties.enabled()
    }
}

// ---------------------------------------------------------------------------
// Admin input: the per-user CRUD matrix
// ---------------------------------------------------------------------------

/// One page of the `{ "crud": { ... } }` body accepted by the permissions
/// admin endpoint. Create/update/delete are plain switches; read carries the
/// full properties payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMatrix {
    #[serde(default)]
    pub create: Option<bool>,
    #[serde(default)]
    pub read: Option<Value>,
    #[serde(default)]
    pub update: Option<bool>,
    #[serde(default)]
    pub delete: Option<bool>,
}

/// A grant ready to be inserted (no user id yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub page: Page,
    pub action: Action,
    pub properties: GrantProperties,
}

/// Turn the admin matrix into the rows to store. Switches set to `false` (or
/// omitted) produce no row, which is how denial is represented. Read payloads
/// are parsed with the same rules as stored grants, and row-scoped pages must
/// name a scope.
pub fn grants_from_matrix<'a, I>(matrix: I) -> Result<Vec<NewGrant>, CoreError>
where
    I: IntoIterator<Item = (&'a str, &'a PageMatrix)>,
{
    let mut grants = Vec::new();
    for (page_name, entry) in matrix {
        let page: Page = page_name.parse()?;

        for (action, switch) in [
            (Action::Create, entry.create),
            (Action::Update, entry.update),
            (Action::Delete, entry.delete),
        ] {
            if switch == Some(true) {
                grants.push(NewGrant {
                    page,
                    action,
                    properties: GrantProperties::Flag { enabled: true },
                });
            }
        }

        if let Some(read) = &entry.read {
            let properties = GrantProperties::from_value(read.clone()).map_err(|e| match e {
                CoreError::InvalidScope(msg) => {
                    CoreError::Validation(format!("{page} read permission: {msg}"))
                }
                other => other,
            })?;
            if page.is_row_scoped() && properties.scope().is_none() && properties.enabled() {
                return Err(CoreError::Validation(format!(
                    "{page} read permission must name a scope"
                )));
            }
            if properties.scope().is_some_and(Scope::is_misconfigured) {
                return Err(CoreError::Validation(format!(
                    "{page} read scope requires a non-empty userIds list"
                )));
            }
            if properties.enabled() {
                grants.push(NewGrant {
                    page,
                    action: Action::Read,
                    properties,
                });
            }
        }
    }
    grants.sort_by_key(|g| (g.page, g.action));
    Ok(grants)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

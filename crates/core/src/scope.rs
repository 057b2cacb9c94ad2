//! Scope resolution: turns a viewer's read grant into a row predicate.
//!
//! Projects, Users and Tasks share one scope vocabulary. Resolution produces
//! a [`ScopeFilter`] value (not a closure) wrapped in an entity-specific
//! predicate type, so the same grant can be evaluated, logged and tested
//! without touching the database.
//!
//! Every path that cannot prove visibility resolves to
//! [`ScopeFilter::Nothing`]: an absent or disabled grant, the `none` scope,
//! a list scope without user ids, or an own-factory / own-client scope for a
//! viewer who has no home factory / client.

use std::collections::{HashMap, HashSet};

use crate::error::CoreError;
use crate::permission::{Action, Grant, GrantProperties, Page, Scope};
use crate::types::DbId;
use crate::viewer::Viewer;

// ---------------------------------------------------------------------------
// Row accessors
// ---------------------------------------------------------------------------

/// Fields of a project the resolver reads.
pub trait ProjectRecord {
    fn project_id(&self) -> DbId;
    fn factory(&self) -> Option<&str>;
    fn client(&self) -> Option<&str>;
    fn created_by(&self) -> Option<DbId>;
}

/// Fields of a user (team member) the resolver reads.
pub trait UserRecord {
    fn user_id(&self) -> DbId;
    fn factory(&self) -> Option<&str>;
    fn client_company_name(&self) -> Option<&str>;
}

/// Fields of a history entry joined with its project.
pub trait TaskRecord {
    fn created_by(&self) -> Option<DbId>;
    /// The user the entry is assigned to, resolved from the display name.
    fn assignee_id(&self) -> Option<DbId>;
    fn project_factory(&self) -> Option<&str>;
    fn project_client(&self) -> Option<&str>;
}

// ---------------------------------------------------------------------------
// Assignment index
// ---------------------------------------------------------------------------

/// One "user U is assigned a history entry on project P" fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub user_id: DbId,
    pub project_id: DbId,
    pub project_factory: Option<String>,
    pub project_client: Option<String>,
}

/// Lookup tables for the joins scope rules need: which factories and clients
/// a user works for through assignments, and which users work on a project.
#[derive(Debug, Clone, Default)]
pub struct AssignmentIndex {
    factories_by_user: HashMap<DbId, HashSet<String>>,
    clients_by_user: HashMap<DbId, HashSet<String>>,
    users_by_project: HashMap<DbId, HashSet<DbId>>,
}

impl AssignmentIndex {
    pub fn insert(&mut self, a: Assignment) {
        if let Some(factory) = a.project_factory {
            self.factories_by_user
                .entry(a.user_id)
                .or_default()
                .insert(factory);
        }
        if let Some(client) = a.project_client {
            self.clients_by_user
                .entry(a.user_id)
                .or_default()
                .insert(client);
        }
        self.users_by_project
            .entry(a.project_id)
            .or_default()
            .insert(a.user_id);
    }

    fn user_works_for_factory(&self, user_id: DbId, factory: &str) -> bool {
        self.factories_by_user
            .get(&user_id)
            .is_some_and(|set| set.contains(factory))
    }

    fn user_works_for_client(&self, user_id: DbId, client: &str) -> bool {
        self.clients_by_user
            .get(&user_id)
            .is_some_and(|set| set.contains(client))
    }

    fn project_has_any_user(&self, project_id: DbId, users: &HashSet<DbId>) -> bool {
        self.users_by_project
            .get(&project_id)
            .is_some_and(|set| !set.is_disjoint(users))
    }
}

impl FromIterator<Assignment> for AssignmentIndex {
    fn from_iter<I: IntoIterator<Item = Assignment>>(iter: I) -> Self {
        let mut index = Self::default();
        for a in iter {
            index.insert(a);
        }
        index
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// The entity-independent shape of a resolved scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Everything,
    Nothing,
    /// Row's scoping factory column must be set.
    FactoryPopulated,
    /// Row's scoping client column must be set.
    ClientPopulated,
    /// Row belongs to the viewer.
    Owner(DbId),
    Factory(String),
    Client(String),
    Users(HashSet<DbId>),
}

impl ScopeFilter {
    pub fn is_nothing(&self) -> bool {
        matches!(self, ScopeFilter::Nothing)
    }

    fn from_scope(scope: &Scope, viewer: &Viewer) -> Self {
        match scope {
            Scope::All => ScopeFilter::Everything,
            Scope::AllFactories => ScopeFilter::FactoryPopulated,
            Scope::AllClients => ScopeFilter::ClientPopulated,
            Scope::Own => ScopeFilter::Owner(viewer.id),
            Scope::OwnFactory => match &viewer.factory {
                Some(f) => ScopeFilter::Factory(f.clone()),
                None => ScopeFilter::Nothing,
            },
            Scope::OwnClient => match &viewer.client_company_name {
                Some(c) => ScopeFilter::Client(c.clone()),
                None => ScopeFilter::Nothing,
            },
            Scope::SpecificUsers(ids) | Scope::UserProjects(ids) | Scope::UserTasks(ids) => {
                if ids.is_empty() {
                    ScopeFilter::Nothing
                } else {
                    ScopeFilter::Users(ids.iter().copied().collect())
                }
            }
            Scope::None => ScopeFilter::Nothing,
        }
    }
}

/// Visibility predicate over projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPredicate(pub ScopeFilter);

/// Visibility predicate over team members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPredicate(pub ScopeFilter);

/// Visibility predicate over history entries joined with their project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPredicate(pub ScopeFilter);

impl ProjectPredicate {
    pub fn matches<P: ProjectRecord>(&self, project: &P, index: &AssignmentIndex) -> bool {
        match &self.0 {
            ScopeFilter::Everything => true,
            ScopeFilter::Nothing => false,
            ScopeFilter::FactoryPopulated => project.factory().is_some(),
            ScopeFilter::ClientPopulated => project.client().is_some(),
            ScopeFilter::Owner(id) => project.created_by() == Some(*id),
            ScopeFilter::Factory(f) => project.factory() == Some(f.as_str()),
            ScopeFilter::Client(c) => project.client() == Some(c.as_str()),
            ScopeFilter::Users(ids) => index.project_has_any_user(project.project_id(), ids),
        }
    }
}

impl UserPredicate {
    /// Own-factory and own-client also admit users who are assigned work on
    /// a project of the viewer's factory / client, whatever their home is.
    pub fn matches<U: UserRecord>(&self, user: &U, index: &AssignmentIndex) -> bool {
        match &self.0 {
            ScopeFilter::Everything => true,
            ScopeFilter::Nothing => false,
            ScopeFilter::FactoryPopulated => user.factory().is_some(),
            ScopeFilter::ClientPopulated => user.client_company_name().is_some(),
            ScopeFilter::Owner(id) => user.user_id() == *id,
            ScopeFilter::Factory(f) => {
                user.factory() == Some(f.as_str())
                    || index.user_works_for_factory(user.user_id(), f)
            }
            ScopeFilter::Client(c) => {
                user.client_company_name() == Some(c.as_str())
                    || index.user_works_for_client(user.user_id(), c)
            }
            ScopeFilter::Users(ids) => ids.contains(&user.user_id()),
        }
    }
}

impl TaskPredicate {
    pub fn matches<T: TaskRecord>(&self, task: &T) -> bool {
        match &self.0 {
            ScopeFilter::Everything => true,
            ScopeFilter::Nothing => false,
            ScopeFilter::FactoryPopulated => task.project_factory().is_some(),
            ScopeFilter::ClientPopulated => task.project_client().is_some(),
            ScopeFilter::Owner(id) => {
                task.created_by() == Some(*id) || task.assignee_id() == Some(*id)
            }
            ScopeFilter::Factory(f) => task.project_factory() == Some(f.as_str()),
            ScopeFilter::Client(c) => task.project_client() == Some(c.as_str()),
            ScopeFilter::Users(ids) => task.assignee_id().is_some_and(|id| ids.contains(&id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn resolve(page: Page, grant: Option<&Grant>, viewer: &Viewer) -> Result<ScopeFilter, CoreError> {
    let Some(grant) = grant else {
        return Ok(ScopeFilter::Nothing);
    };
    if grant.page != page || grant.action != Action::Read {
        return Err(CoreError::Internal(format!(
            "{} {} grant passed to the {page} read resolver",
            grant.page, grant.action
        )));
    }
    match &grant.properties {
        GrantProperties::Scoped { enabled: false, .. }
        | GrantProperties::Flag { enabled: false } => Ok(ScopeFilter::Nothing),
        GrantProperties::Scoped {
            enabled: true,
            scope,
        } => Ok(ScopeFilter::from_scope(scope, viewer)),
        GrantProperties::Flag { enabled: true } => Err(CoreError::InvalidScope(format!(
            "{page} read grant for user {} has no scope",
            grant.user_id
        ))),
    }
}

pub fn resolve_project_predicate(
    grant: Option<&Grant>,
    viewer: &Viewer,
) -> Result<ProjectPredicate, CoreError> {
    resolve(Page::Projects, grant, viewer).map(ProjectPredicate)
}

pub fn resolve_user_predicate(
    grant: Option<&Grant>,
    viewer: &Viewer,
) -> Result<UserPredicate, CoreError> {
    resolve(Page::Users, grant, viewer).map(UserPredicate)
}

pub fn resolve_task_predicate(
    grant: Option<&Grant>,
    viewer: &Viewer,
) -> Result<TaskPredicate, CoreError> {
    resolve(Page::Tasks, grant, viewer).map(TaskPredicate)
}

/// Configuration read is a page-level gate with no row scope.
pub fn configuration_allowed(grant: Option<&Grant>) -> bool {
    grant.is_some_and(|g| g.page == Page::Configuration && g.enabled())
}

/// Whether the viewer may open the permissions admin UI.
pub fn crud_visible(grant: Option<&Grant>) -> bool {
    grant.is_some_and(|g| g.page == Page::Crud && g.enabled())
}

/// Create / update / delete are plain switches.
pub fn action_allowed(grant: Option<&Grant>) -> bool {
    grant.is_some_and(Grant::enabled)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

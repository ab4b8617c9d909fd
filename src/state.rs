use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::assignment::AssignmentEngine;
use crate::config::Config;
use crate::path::PathMaintainer;
use crate::resolver::AuthorizationResolver;
use crate::service::{DepartmentService, PermissionService, RoleService, UserService};

/// Application state shared by callers of the directory and authorization APIs
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn paths(&self) -> PathMaintainer {
        PathMaintainer::new(self.db.clone(), &self.config.hierarchy)
    }

    pub fn assignments(&self) -> AssignmentEngine {
        AssignmentEngine::new(self.db.clone())
    }

    pub fn resolver(&self) -> AuthorizationResolver {
        AuthorizationResolver::new(self.db.clone(), &self.config.authz)
    }

    pub fn departments(&self) -> DepartmentService {
        DepartmentService::new(self.db.clone(), self.paths())
    }

    pub fn permissions(&self) -> PermissionService {
        PermissionService::new(self.db.clone(), self.paths())
    }

    pub fn roles(&self) -> RoleService {
        RoleService::new(self.db.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.clone(), &self.config.security)
    }
}

//! mes-rbac - Organisation hierarchy and role-based access control
//!
//! Departments and permissions are self-referencing trees with materialized
//! ancestor paths. Users hold roles, roles grant permissions, and a user's
//! effective permission set is the union over their roles.

pub mod assignment;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod path;
pub mod resolver;
pub mod service;
pub mod setup;
pub mod state;
pub mod tree;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use assignment::{AssignmentEngine, AssignmentOutcome};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use path::{Hierarchy, PathMaintainer, PathReport};
pub use resolver::AuthorizationResolver;
pub use state::AppState;
pub use tree::{Forest, TreeDiagnostic, TreeItem, TreeNode};

//! Built-in records
//!
//! Seeds the administrator role and the permissions it needs to manage the
//! directory. Safe to run on every start.

use tracing::info;

use crate::entity::permission::PermissionKind;
use crate::entity::role::{self, RoleKind};
use crate::error::AppResult;
use crate::service::permission::NewPermission;
use crate::service::role::NewRole;
use crate::state::AppState;

pub const ADMIN_ROLE: &str = "admin";
pub const SYSTEM_MENU: &str = "system";
pub const RBAC_MENU: &str = "system:rbac";

/// Create the admin role and its menus if absent and make sure the role
/// grants them. Existing grants are left alone.
pub async fn ensure_defaults(state: &AppState) -> AppResult<role::Model> {
    let permissions = state.permissions();
    let system = permissions
        .ensure(NewPermission {
            code: SYSTEM_MENU.to_string(),
            name: "System".to_string(),
            kind: PermissionKind::Menu,
            parent_id: None,
            sort_order: 0,
        })
        .await?;
    let rbac = permissions
        .ensure(NewPermission {
            code: RBAC_MENU.to_string(),
            name: "Organisation & Permissions".to_string(),
            kind: PermissionKind::Menu,
            parent_id: Some(system.id),
            sort_order: 0,
        })
        .await?;

    let admin = state
        .roles()
        .ensure(NewRole {
            code: ADMIN_ROLE.to_string(),
            name: "Administrator".to_string(),
            kind: RoleKind::System,
        })
        .await?;

    let assignments = state.assignments();
    let granted = assignments.role_permission_ids(admin.id).await?;
    for permission_id in [system.id, rbac.id] {
        if !granted.contains(&permission_id) {
            assignments.grant_permission(admin.id, permission_id, 0).await?;
            info!("Granted built-in permission {} to {}", permission_id, ADMIN_ROLE);
        }
    }
    Ok(admin)
}

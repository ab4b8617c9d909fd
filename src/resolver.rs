//! Authorization resolver
//!
//! Computes a user's effective permissions: the union over all of the user's
//! roles, active permissions only, each permission once.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::AuthzConfig;
use crate::entity::{permission, role, role_permission, user_role, Status};
use crate::error::AppResult;
use crate::tree::{self, TreeNode};

#[derive(Clone)]
pub struct AuthorizationResolver {
    db: DatabaseConnection,
    skip_inactive_roles: bool,
}

impl AuthorizationResolver {
    pub fn new(db: DatabaseConnection, config: &AuthzConfig) -> Self {
        Self {
            db,
            skip_inactive_roles: config.skip_inactive_roles,
        }
    }

    /// Active permissions reachable through any of the user's roles, ordered
    /// by sort order then id. A user without roles resolves to an empty list.
    pub async fn effective_permissions(&self, user_id: i64) -> AppResult<Vec<permission::Model>> {
        let role_ids = self.role_ids(user_id).await?;
        if role_ids.is_empty() {
            debug!("User {} holds no roles", user_id);
            return Ok(Vec::new());
        }

        // A permission granted by several roles appears once here
        let permission_ids: BTreeSet<i64> = role_permission::Entity::find()
            .filter(role_permission::Column::RoleId.is_in(role_ids.iter().copied()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|rp| rp.permission_id)
            .collect();
        if permission_ids.is_empty() {
            return Ok(Vec::new());
        }

        let permissions = permission::Entity::find()
            .filter(permission::Column::Id.is_in(permission_ids))
            .filter(permission::Column::Status.eq(i32::from(Status::Active)))
            .order_by_asc(permission::Column::SortOrder)
            .order_by_asc(permission::Column::Id)
            .all(&self.db)
            .await?;

        debug!(
            "User {} resolved {} permissions through {} roles",
            user_id,
            permissions.len(),
            role_ids.len()
        );
        Ok(permissions)
    }

    pub async fn effective_permission_codes(&self, user_id: i64) -> AppResult<BTreeSet<String>> {
        Ok(self
            .effective_permissions(user_id)
            .await?
            .into_iter()
            .map(|p| p.code)
            .collect())
    }

    /// Exact, case-sensitive match on the permission code
    pub async fn has_permission(&self, user_id: i64, code: &str) -> AppResult<bool> {
        Ok(self
            .effective_permissions(user_id)
            .await?
            .iter()
            .any(|p| p.code == code))
    }

    pub async fn has_any_permission(&self, user_id: i64, codes: &[&str]) -> AppResult<bool> {
        if codes.is_empty() {
            return Ok(false);
        }
        Ok(self
            .effective_permissions(user_id)
            .await?
            .iter()
            .any(|p| codes.contains(&p.code.as_str())))
    }

    /// The user's menu entries as a forest. A granted menu whose parent was not
    /// granted is shown as a root.
    pub async fn menu_permissions(&self, user_id: i64) -> AppResult<Vec<TreeNode<permission::Model>>> {
        let menus = self
            .effective_permissions(user_id)
            .await?
            .into_iter()
            .filter(|p| p.is_menu())
            .collect();
        Ok(tree::build_forest(menus))
    }

    /// Every active permission as a forest
    pub async fn permission_tree(&self) -> AppResult<Vec<TreeNode<permission::Model>>> {
        let permissions = permission::Entity::find()
            .filter(permission::Column::Status.eq(i32::from(Status::Active)))
            .order_by_asc(permission::Column::SortOrder)
            .order_by_asc(permission::Column::Id)
            .all(&self.db)
            .await?;

        let forest = tree::assemble(permissions);
        if !forest.diagnostics.is_empty() {
            debug!("Permission tree built with {} repaired nodes", forest.diagnostics.len());
        }
        Ok(forest.roots)
    }

    pub async fn user_permission_tree(&self, user_id: i64) -> AppResult<Vec<TreeNode<permission::Model>>> {
        Ok(tree::build_forest(self.effective_permissions(user_id).await?))
    }

    async fn role_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let role_ids: Vec<i64> = user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|ur| ur.role_id)
            .collect();

        if !self.skip_inactive_roles || role_ids.is_empty() {
            return Ok(role_ids);
        }

        let active = role::Entity::find()
            .filter(role::Column::Id.is_in(role_ids))
            .filter(role::Column::Status.eq(i32::from(Status::Active)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        Ok(active)
    }
}

//! Permission service
//!
//! Maintains the permission catalogue (menus, buttons, data scopes) as a tree
//! of its own, independent of the department tree.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::check_text;
use crate::entity::permission::PermissionKind;
use crate::entity::{permission, role_permission, Status};
use crate::error::{AppError, AppResult, OptionExt};
use crate::path::{is_descendant_path, Hierarchy, PathMaintainer};
use crate::tree::{self, TreeNode};

#[derive(Debug, Clone, Deserialize)]
pub struct NewPermission {
    pub code: String,
    pub name: String,
    pub kind: PermissionKind,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionChanges {
    pub code: Option<String>,
    pub name: Option<String>,
    pub kind: Option<PermissionKind>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i32>,
    #[serde(rename = "parentId", default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<i64>>,
}

#[derive(Clone)]
pub struct PermissionService {
    db: DatabaseConnection,
    paths: PathMaintainer,
}

impl PermissionService {
    pub fn new(db: DatabaseConnection, paths: PathMaintainer) -> Self {
        Self { db, paths }
    }

    pub async fn create(&self, req: NewPermission) -> AppResult<permission::Model> {
        check_text("permission code", &req.code, 64)?;
        check_text("permission name", &req.name, 64)?;
        self.ensure_code_free(&req.code, None).await?;

        if let Some(parent_id) = req.parent_id {
            self.get(parent_id).await?;
        }

        let perm = permission::ActiveModel {
            code: Set(req.code),
            name: Set(req.name),
            kind: Set(req.kind.into()),
            parent_id: Set(req.parent_id),
            path: Set(String::new()),
            sort_order: Set(req.sort_order),
            status: Set(Status::Active.into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        self.paths.recompute(Hierarchy::Permission, perm.id).await?;
        info!("Created permission {} ({})", perm.code, perm.id);
        self.get(perm.id).await
    }

    /// Look a permission up by code, creating it when absent
    pub async fn ensure(&self, req: NewPermission) -> AppResult<permission::Model> {
        match self.find_by_code(&req.code).await? {
            Some(existing) => Ok(existing),
            None => self.create(req).await,
        }
    }

    pub async fn update(&self, id: i64, changes: PermissionChanges) -> AppResult<permission::Model> {
        let current = self.get(id).await?;
        let mut model: permission::ActiveModel = current.clone().into();

        if let Some(code) = changes.code {
            check_text("permission code", &code, 64)?;
            if code != current.code {
                self.ensure_code_free(&code, Some(id)).await?;
            }
            model.code = Set(code);
        }
        if let Some(name) = changes.name {
            check_text("permission name", &name, 64)?;
            model.name = Set(name);
        }
        if let Some(kind) = changes.kind {
            model.kind = Set(kind.into());
        }
        if let Some(sort_order) = changes.sort_order {
            model.sort_order = Set(sort_order);
        }

        let new_parent = match changes.parent_id {
            Some(parent_id) if parent_id != current.parent_id => {
                if let Some(parent_id) = parent_id {
                    if parent_id == id {
                        return Err(AppError::Validation(format!(
                            "permission {} cannot be its own parent",
                            id
                        )));
                    }
                    let parent = self.get(parent_id).await?;
                    if is_descendant_path(&parent.path, id) {
                        return Err(AppError::Validation(format!(
                            "permission {} cannot move under its descendant {}",
                            id, parent_id
                        )));
                    }
                }
                Some(parent_id)
            }
            _ => None,
        };

        // Parent and paths commit together ahead of the plain field updates
        if let Some(parent_id) = new_parent {
            let report = self.paths.move_node(Hierarchy::Permission, id, parent_id).await?;
            if !report.is_clean() {
                warn!(
                    "Moving permission {} left {} diagnostics and {} failed subtrees",
                    id,
                    report.diagnostics.len(),
                    report.failures.len()
                );
            }
        }

        if model.is_changed() {
            model.update(&self.db).await?;
        }
        self.get(id).await
    }

    pub async fn set_status(&self, id: i64, status: Status) -> AppResult<()> {
        let result = permission::Entity::update_many()
            .col_expr(permission::Column::Status, Expr::value(i32::from(status)))
            .filter(permission::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("permission {}", id)));
        }
        info!("Permission {} set to {:?}", id, status);
        Ok(())
    }

    pub async fn get(&self, id: i64) -> AppResult<permission::Model> {
        permission::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("permission {}", id))
    }

    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<permission::Model>> {
        Ok(permission::Entity::find()
            .filter(permission::Column::Code.eq(code))
            .one(&self.db)
            .await?)
    }

    pub async fn list(&self, kind: Option<PermissionKind>) -> AppResult<Vec<permission::Model>> {
        let mut query = permission::Entity::find();
        if let Some(kind) = kind {
            query = query.filter(permission::Column::Kind.eq(i32::from(kind)));
        }
        Ok(query
            .order_by_asc(permission::Column::SortOrder)
            .order_by_asc(permission::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn tree(&self, active_only: bool) -> AppResult<Vec<TreeNode<permission::Model>>> {
        let mut query = permission::Entity::find();
        if active_only {
            query = query.filter(permission::Column::Status.eq(i32::from(Status::Active)));
        }
        let perms = query
            .order_by_asc(permission::Column::SortOrder)
            .order_by_asc(permission::Column::Id)
            .all(&self.db)
            .await?;
        Ok(tree::build_forest(perms))
    }

    /// Hard delete. Refused while children exist or any role still grants it.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let perm = self.get(id).await?;

        let children = permission::Entity::find()
            .filter(permission::Column::ParentId.eq(id))
            .count(&self.db)
            .await?;
        if children > 0 {
            return Err(AppError::Conflict(format!(
                "permission {} still has {} children",
                perm.code, children
            )));
        }

        let grants = role_permission::Entity::find()
            .filter(role_permission::Column::PermissionId.eq(id))
            .count(&self.db)
            .await?;
        if grants > 0 {
            return Err(AppError::Conflict(format!(
                "permission {} is still granted by {} roles",
                perm.code, grants
            )));
        }

        permission::Entity::delete_by_id(id).exec(&self.db).await?;
        info!("Deleted permission {} ({})", perm.code, id);
        Ok(())
    }

    async fn ensure_code_free(&self, code: &str, except: Option<i64>) -> AppResult<()> {
        let mut query = permission::Entity::find().filter(permission::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(permission::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(AppError::Conflict(format!("permission code {} already exists", code)));
        }
        Ok(())
    }
}

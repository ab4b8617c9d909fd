//! Department service

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::check_text;
use crate::entity::{department, user, Status};
use crate::error::{AppError, AppResult, OptionExt};
use crate::path::{is_descendant_path, Hierarchy, PathMaintainer};
use crate::tree::{self, TreeNode};

/// Add department request
#[derive(Debug, Clone, Deserialize)]
pub struct NewDepartment {
    pub code: String,
    pub name: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: i32,
}

/// Update department request; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentChanges {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<i32>,
    /// `Some(None)` moves the department to the top level
    #[serde(rename = "parentId", default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<i64>>,
}

#[derive(Clone)]
pub struct DepartmentService {
    db: DatabaseConnection,
    paths: PathMaintainer,
}

impl DepartmentService {
    pub fn new(db: DatabaseConnection, paths: PathMaintainer) -> Self {
        Self { db, paths }
    }

    pub async fn create(&self, req: NewDepartment) -> AppResult<department::Model> {
        check_text("department code", &req.code, 32)?;
        check_text("department name", &req.name, 64)?;
        self.ensure_code_free(&req.code, None).await?;

        if let Some(parent_id) = req.parent_id {
            department::Entity::find_by_id(parent_id)
                .one(&self.db)
                .await?
                .ok_or_not_found(format!("parent department {}", parent_id))?;
        }

        let dept = department::ActiveModel {
            code: Set(req.code),
            name: Set(req.name),
            parent_id: Set(req.parent_id),
            path: Set(String::new()),
            sort_order: Set(req.sort_order),
            status: Set(Status::Active.into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        self.paths.recompute(Hierarchy::Department, dept.id).await?;
        info!("Created department {} ({})", dept.code, dept.id);
        self.get(dept.id).await
    }

    pub async fn update(&self, id: i64, changes: DepartmentChanges) -> AppResult<department::Model> {
        let current = self.get(id).await?;
        let mut model: department::ActiveModel = current.clone().into();

        if let Some(code) = changes.code {
            check_text("department code", &code, 32)?;
            if code != current.code {
                self.ensure_code_free(&code, Some(id)).await?;
            }
            model.code = Set(code);
        }
        if let Some(name) = changes.name {
            check_text("department name", &name, 64)?;
            model.name = Set(name);
        }
        if let Some(sort_order) = changes.sort_order {
            model.sort_order = Set(sort_order);
        }

        let new_parent = match changes.parent_id {
            Some(parent_id) if parent_id != current.parent_id => {
                if let Some(parent_id) = parent_id {
                    self.check_new_parent(id, parent_id).await?;
                }
                Some(parent_id)
            }
            _ => None,
        };

        // Parent and paths commit together ahead of the plain field updates
        if let Some(parent_id) = new_parent {
            let report = self.paths.move_node(Hierarchy::Department, id, parent_id).await?;
            if !report.is_clean() {
                warn!(
                    "Moving department {} left {} diagnostics and {} failed subtrees",
                    id,
                    report.diagnostics.len(),
                    report.failures.len()
                );
            }
            info!("Moved department {} under {:?}", id, parent_id);
        }

        if model.is_changed() {
            model.update(&self.db).await?;
        }
        self.get(id).await
    }

    pub async fn set_status(&self, id: i64, status: Status) -> AppResult<()> {
        let result = department::Entity::update_many()
            .col_expr(department::Column::Status, Expr::value(i32::from(status)))
            .filter(department::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("department {}", id)));
        }
        info!("Department {} set to {:?}", id, status);
        Ok(())
    }

    pub async fn get(&self, id: i64) -> AppResult<department::Model> {
        department::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("department {}", id))
    }

    pub async fn list(&self) -> AppResult<Vec<department::Model>> {
        Ok(department::Entity::find()
            .order_by_asc(department::Column::SortOrder)
            .order_by_asc(department::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn tree(&self, active_only: bool) -> AppResult<Vec<TreeNode<department::Model>>> {
        let mut query = department::Entity::find();
        if active_only {
            query = query.filter(department::Column::Status.eq(i32::from(Status::Active)));
        }
        let depts = query
            .order_by_asc(department::Column::SortOrder)
            .order_by_asc(department::Column::Id)
            .all(&self.db)
            .await?;
        Ok(tree::build_forest(depts))
    }

    /// Hard delete. Refused while sub-departments or members remain.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let dept = self.get(id).await?;

        let children = department::Entity::find()
            .filter(department::Column::ParentId.eq(id))
            .count(&self.db)
            .await?;
        if children > 0 {
            return Err(AppError::Conflict(format!(
                "department {} still has {} sub-departments",
                dept.code, children
            )));
        }

        let members = user::Entity::find()
            .filter(user::Column::DepartmentId.eq(id))
            .count(&self.db)
            .await?;
        if members > 0 {
            return Err(AppError::Conflict(format!(
                "department {} still has {} members",
                dept.code, members
            )));
        }

        department::Entity::delete_by_id(id).exec(&self.db).await?;
        info!("Deleted department {} ({})", dept.code, id);
        Ok(())
    }

    async fn ensure_code_free(&self, code: &str, except: Option<i64>) -> AppResult<()> {
        let mut query = department::Entity::find().filter(department::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(department::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(AppError::Conflict(format!("department code {} already exists", code)));
        }
        Ok(())
    }

    async fn check_new_parent(&self, id: i64, parent_id: i64) -> AppResult<()> {
        if parent_id == id {
            return Err(AppError::Validation(format!("department {} cannot be its own parent", id)));
        }
        let parent = department::Entity::find_by_id(parent_id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("parent department {}", parent_id))?;
        if is_descendant_path(&parent.path, id) {
            return Err(AppError::Validation(format!(
                "department {} cannot move under its descendant {}",
                id, parent_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HierarchyConfig;
    use crate::testutil;
    use crate::tree::flatten;

    async fn service() -> (DepartmentService, DatabaseConnection) {
        let db = testutil::db().await;
        let paths = PathMaintainer::new(db.clone(), &HierarchyConfig::default());
        (DepartmentService::new(db.clone(), paths), db)
    }

    fn new_dept(code: &str, parent_id: Option<i64>) -> NewDepartment {
        NewDepartment {
            code: code.to_string(),
            name: format!("{} workshop", code),
            parent_id,
            sort_order: 0,
        }
    }

    #[tokio::test]
    async fn create_assigns_paths() {
        let (svc, _db) = service().await;
        let plant = svc.create(new_dept("PLANT", None)).await.unwrap();
        let line = svc.create(new_dept("LINE1", Some(plant.id))).await.unwrap();

        assert_eq!(plant.path, plant.id.to_string());
        assert_eq!(line.path, format!("{},{}", plant.id, line.id));
    }

    #[tokio::test]
    async fn create_rejects_duplicates_and_missing_parent() {
        let (svc, _db) = service().await;
        svc.create(new_dept("PLANT", None)).await.unwrap();

        let dup = svc.create(new_dept("PLANT", None)).await.unwrap_err();
        assert!(matches!(dup, AppError::Conflict(_)));

        let orphan = svc.create(new_dept("LOST", Some(77))).await.unwrap_err();
        assert!(matches!(orphan, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn move_cascades_and_rejects_cycles() {
        let (svc, _db) = service().await;
        let a = svc.create(new_dept("A", None)).await.unwrap();
        let b = svc.create(new_dept("B", Some(a.id))).await.unwrap();
        let c = svc.create(new_dept("C", Some(a.id))).await.unwrap();
        let d = svc.create(new_dept("D", Some(b.id))).await.unwrap();

        let moved = svc
            .update(
                b.id,
                DepartmentChanges {
                    parent_id: Some(Some(c.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.path, format!("{},{},{}", a.id, c.id, b.id));
        assert_eq!(svc.get(d.id).await.unwrap().path, format!("{},{},{},{}", a.id, c.id, b.id, d.id));

        let under_child = svc
            .update(
                a.id,
                DepartmentChanges {
                    parent_id: Some(Some(d.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(under_child, AppError::Validation(_)));

        let to_root = svc
            .update(
                b.id,
                DepartmentChanges {
                    parent_id: Some(None),
                    name: Some("Spun off".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(to_root.path, b.id.to_string());
        assert_eq!(to_root.name, "Spun off");
        assert_eq!(svc.get(d.id).await.unwrap().path, format!("{},{}", b.id, d.id));
    }

    #[tokio::test]
    async fn tree_respects_status_filter() {
        let (svc, _db) = service().await;
        let a = svc.create(new_dept("A", None)).await.unwrap();
        let b = svc.create(new_dept("B", Some(a.id))).await.unwrap();
        let c = svc.create(new_dept("C", Some(b.id))).await.unwrap();
        svc.set_status(b.id, Status::Inactive).await.unwrap();

        assert_eq!(flatten(&svc.tree(false).await.unwrap()), vec![a.id, b.id, c.id]);
        // c loses its inactive parent and surfaces as a root
        assert_eq!(flatten(&svc.tree(true).await.unwrap()), vec![a.id, c.id]);
        assert_eq!(svc.tree(true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_refused_while_occupied() {
        let (svc, db) = service().await;
        let a = svc.create(new_dept("A", None)).await.unwrap();
        let b = svc.create(new_dept("B", Some(a.id))).await.unwrap();

        assert!(matches!(svc.delete(a.id).await, Err(AppError::Conflict(_))));

        let member = testutil::user(&db, "ivan").await;
        user::Entity::update_many()
            .col_expr(user::Column::DepartmentId, Expr::value(Some(b.id)))
            .filter(user::Column::Id.eq(member))
            .exec(&db)
            .await
            .unwrap();
        assert!(matches!(svc.delete(b.id).await, Err(AppError::Conflict(_))));

        user::Entity::delete_by_id(member).exec(&db).await.unwrap();
        svc.delete(b.id).await.unwrap();
        svc.delete(a.id).await.unwrap();
        assert!(svc.list().await.unwrap().is_empty());
        assert!(matches!(svc.set_status(a.id, Status::Active).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_move_leaves_department_in_place() {
        let db = testutil::db().await;
        let paths = PathMaintainer::new(db.clone(), &HierarchyConfig { atomic_path_cascade: true });
        let svc = DepartmentService::new(db.clone(), paths);
        let a = svc.create(new_dept("A", None)).await.unwrap();
        let b = svc.create(new_dept("B", Some(a.id))).await.unwrap();
        let c = svc.create(new_dept("C", Some(a.id))).await.unwrap();
        let d = svc.create(new_dept("D", Some(b.id))).await.unwrap();
        testutil::reject_path_writes(&db, "sys_department", d.id).await;

        let err = svc
            .update(
                b.id,
                DepartmentChanges {
                    parent_id: Some(Some(c.id)),
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CascadeAborted(_)));

        let after = svc.get(b.id).await.unwrap();
        assert_eq!(after.parent_id, Some(a.id));
        assert_eq!(after.path, b.path);
        assert_eq!(after.name, b.name);
        assert_eq!(svc.get(d.id).await.unwrap().path, d.path);
    }

    #[test]
    fn null_parent_means_move_to_top_level() {
        let to_root: DepartmentChanges = serde_json::from_str(r#"{"parentId": null}"#).unwrap();
        assert_eq!(to_root.parent_id, Some(None));

        let untouched: DepartmentChanges = serde_json::from_str(r#"{"name": "Paint shop"}"#).unwrap();
        assert_eq!(untouched.parent_id, None);

        let under: DepartmentChanges = serde_json::from_str(r#"{"parentId": 7}"#).unwrap();
        assert_eq!(under.parent_id, Some(Some(7)));
    }
}

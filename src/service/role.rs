//! Role service

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::info;

use super::check_text;
use crate::entity::role::RoleKind;
use crate::entity::{role, role_permission, user_role, Status};
use crate::error::{AppError, AppResult, OptionExt};

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub code: String,
    pub name: String,
    pub kind: RoleKind,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleChanges {
    pub code: Option<String>,
    pub name: Option<String>,
    pub kind: Option<RoleKind>,
}

#[derive(Clone)]
pub struct RoleService {
    db: DatabaseConnection,
}

impl RoleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, req: NewRole) -> AppResult<role::Model> {
        check_text("role code", &req.code, 32)?;
        check_text("role name", &req.name, 64)?;
        self.ensure_code_free(&req.code, None).await?;

        let created = role::ActiveModel {
            code: Set(req.code),
            name: Set(req.name),
            kind: Set(req.kind.into()),
            status: Set(Status::Active.into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Created role {} ({})", created.code, created.id);
        Ok(created)
    }

    /// Look a role up by code, creating it when absent
    pub async fn ensure(&self, req: NewRole) -> AppResult<role::Model> {
        match self.find_by_code(&req.code).await? {
            Some(existing) => Ok(existing),
            None => self.create(req).await,
        }
    }

    pub async fn update(&self, id: i64, changes: RoleChanges) -> AppResult<role::Model> {
        let current = self.get(id).await?;
        let mut model: role::ActiveModel = current.clone().into();

        if let Some(code) = changes.code {
            check_text("role code", &code, 32)?;
            if code != current.code {
                self.ensure_code_free(&code, Some(id)).await?;
            }
            model.code = Set(code);
        }
        if let Some(name) = changes.name {
            check_text("role name", &name, 64)?;
            model.name = Set(name);
        }
        if let Some(kind) = changes.kind {
            model.kind = Set(kind.into());
        }

        if !model.is_changed() {
            return Ok(current);
        }
        Ok(model.update(&self.db).await?)
    }

    pub async fn set_status(&self, id: i64, status: Status) -> AppResult<()> {
        let result = role::Entity::update_many()
            .col_expr(role::Column::Status, Expr::value(i32::from(status)))
            .filter(role::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("role {}", id)));
        }
        info!("Role {} set to {:?}", id, status);
        Ok(())
    }

    pub async fn get(&self, id: i64) -> AppResult<role::Model> {
        role::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("role {}", id))
    }

    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<role::Model>> {
        Ok(role::Entity::find()
            .filter(role::Column::Code.eq(code))
            .one(&self.db)
            .await?)
    }

    pub async fn list(&self) -> AppResult<Vec<role::Model>> {
        Ok(role::Entity::find()
            .order_by_asc(role::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Delete the role together with its grants and memberships
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let existing = self.get(id).await?;

        let (grants, members) = self
            .db
            .transaction::<_, (u64, u64), AppError>(move |txn| {
                Box::pin(async move {
                    let grants = role_permission::Entity::delete_many()
                        .filter(role_permission::Column::RoleId.eq(id))
                        .exec(txn)
                        .await?
                        .rows_affected;
                    let members = user_role::Entity::delete_many()
                        .filter(user_role::Column::RoleId.eq(id))
                        .exec(txn)
                        .await?
                        .rows_affected;
                    role::Entity::delete_by_id(id).exec(txn).await?;
                    Ok((grants, members))
                })
            })
            .await?;

        info!(
            "Deleted role {} ({}), dropped {} grants and {} memberships",
            existing.code, id, grants, members
        );
        Ok(())
    }

    async fn ensure_code_free(&self, code: &str, except: Option<i64>) -> AppResult<()> {
        let mut query = role::Entity::find().filter(role::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(role::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(AppError::Conflict(format!("role code {} already exists", code)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AssignmentEngine;
    use crate::testutil::{self, perm, user};

    fn new_role(code: &str) -> NewRole {
        NewRole {
            code: code.to_string(),
            name: code.to_uppercase(),
            kind: RoleKind::Business,
        }
    }

    #[tokio::test]
    async fn create_update_and_status() {
        let db = testutil::db().await;
        let svc = RoleService::new(db);

        let qa = svc.create(new_role("qa")).await.unwrap();
        svc.create(new_role("planner")).await.unwrap();
        assert!(matches!(svc.create(new_role("qa")).await, Err(AppError::Conflict(_))));

        let renamed = svc
            .update(
                qa.id,
                RoleChanges {
                    name: Some("Quality".to_string()),
                    kind: Some(RoleKind::System),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Quality");
        assert_eq!(RoleKind::from(renamed.kind), RoleKind::System);

        let clash = svc
            .update(
                qa.id,
                RoleChanges {
                    code: Some("planner".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(clash, AppError::Conflict(_)));

        svc.set_status(qa.id, Status::Inactive).await.unwrap();
        assert!(!svc.get(qa.id).await.unwrap().is_active());
        assert_eq!(svc.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_join_rows() {
        let db = testutil::db().await;
        let svc = RoleService::new(db.clone());
        let engine = AssignmentEngine::new(db.clone());

        let qa = svc.create(new_role("qa")).await.unwrap();
        let keep = svc.create(new_role("keep")).await.unwrap();
        let p = perm(&db, "inspect", None).await;
        let u = user(&db, "ivy").await;
        engine.assign_permissions(qa.id, [p], 1).await.unwrap();
        engine.assign_permissions(keep.id, [p], 1).await.unwrap();
        engine.assign_roles(u, [qa.id, keep.id], 1).await.unwrap();

        svc.delete(qa.id).await.unwrap();

        assert!(matches!(svc.get(qa.id).await, Err(AppError::NotFound(_))));
        assert!(engine.role_permission_ids(qa.id).await.unwrap().is_empty());
        assert_eq!(engine.user_role_ids(u).await.unwrap().into_iter().collect::<Vec<_>>(), vec![keep.id]);
        assert_eq!(engine.role_permission_ids(keep.id).await.unwrap().len(), 1);
        assert!(matches!(svc.delete(qa.id).await, Err(AppError::NotFound(_))));
    }
}

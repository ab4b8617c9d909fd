//! User service
//!
//! Accounts only. Role membership goes through the assignment engine.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::check_text;
use crate::config::SecurityConfig;
use crate::entity::{department, user, Status};
use crate::error::{AppError, AppResult, OptionExt};

/// Add user request
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(rename = "departmentId")]
    pub department_id: Option<i64>,
}

#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(db: DatabaseConnection, security: &SecurityConfig) -> Self {
        Self {
            db,
            bcrypt_cost: security.bcrypt_cost,
        }
    }

    pub async fn create(&self, req: NewUser) -> AppResult<user::Model> {
        check_text("username", &req.username, 32)?;
        if req.password.is_empty() {
            return Err(AppError::Validation("password must not be empty".to_string()));
        }
        if self.find_by_username(&req.username).await?.is_some() {
            return Err(AppError::Conflict(format!("username {} already exists", req.username)));
        }
        if let Some(department_id) = req.department_id {
            department::Entity::find_by_id(department_id)
                .one(&self.db)
                .await?
                .ok_or_not_found(format!("department {}", department_id))?;
        }

        let hashed = bcrypt::hash(&req.password, self.bcrypt_cost)?;
        let created = user::ActiveModel {
            username: Set(req.username),
            password: Set(hashed),
            department_id: Set(req.department_id),
            status: Set(Status::Active.into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Created user {} ({})", created.username, created.id);
        Ok(created)
    }

    /// Move a user to another department, or out of all departments
    pub async fn set_department(&self, id: i64, department_id: Option<i64>) -> AppResult<()> {
        if let Some(department_id) = department_id {
            department::Entity::find_by_id(department_id)
                .one(&self.db)
                .await?
                .ok_or_not_found(format!("department {}", department_id))?;
        }
        let result = user::Entity::update_many()
            .col_expr(user::Column::DepartmentId, Expr::value(department_id))
            .filter(user::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    pub async fn set_status(&self, id: i64, status: Status) -> AppResult<()> {
        let result = user::Entity::update_many()
            .col_expr(user::Column::Status, Expr::value(i32::from(status)))
            .filter(user::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("user {}", id)));
        }
        info!("User {} set to {:?}", id, status);
        Ok(())
    }

    pub async fn get(&self, id: i64) -> AppResult<user::Model> {
        user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("user {}", id))
    }

    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    /// Returns the user when the account is active and the password matches
    pub async fn verify_password(&self, username: &str, password: &str) -> AppResult<Option<user::Model>> {
        let Some(account) = self.find_by_username(username).await? else {
            debug!("Login attempt for unknown user {}", username);
            return Ok(None);
        };
        if !account.is_active() {
            debug!("Login attempt for inactive user {}", username);
            return Ok(None);
        }
        if !bcrypt::verify(password, &account.password)? {
            return Ok(None);
        }
        Ok(Some(account))
    }

    pub async fn list_by_department(&self, department_id: i64) -> AppResult<Vec<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::DepartmentId.eq(department_id))
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await?)
    }
}

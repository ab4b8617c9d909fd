//! Shared fixtures for the in-crate tests. Rows are inserted directly so each
//! test controls exactly what is on disk.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::config::DatabaseConfig;
use crate::db;
use crate::entity::permission::PermissionKind;
use crate::entity::role::RoleKind;
use crate::entity::{department, permission, role as role_entity, user as user_entity, Status};

pub async fn db() -> DatabaseConnection {
    db::init_database(&DatabaseConfig::sqlite_memory()).await.unwrap()
}

/// Department with an empty path; the name doubles as its code
pub async fn dept(db: &DatabaseConnection, name: &str, parent_id: Option<i64>) -> i64 {
    department::ActiveModel {
        code: Set(name.to_string()),
        name: Set(name.to_string()),
        parent_id: Set(parent_id),
        path: Set(String::new()),
        sort_order: Set(0),
        status: Set(Status::Active.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

/// Point a department at another parent without touching paths
pub async fn reparent(db: &DatabaseConnection, id: i64, parent_id: Option<i64>) {
    department::Entity::update_many()
        .col_expr(department::Column::ParentId, Expr::value(parent_id))
        .filter(department::Column::Id.eq(id))
        .exec(db)
        .await
        .unwrap();
}

/// Make every write of `path` on one row of `table` fail
pub async fn reject_path_writes(db: &DatabaseConnection, table: &str, id: i64) {
    let sql = format!(
        "CREATE TRIGGER reject_path_{table}_{id} BEFORE UPDATE OF path ON {table} \
         WHEN NEW.id = {id} BEGIN SELECT RAISE(ABORT, 'path write rejected'); END"
    );
    db.execute_unprepared(&sql).await.unwrap();
}

pub async fn parent_of(db: &DatabaseConnection, id: i64) -> Option<i64> {
    department::Entity::find_by_id(id).one(db).await.unwrap().unwrap().parent_id
}

pub async fn perm(db: &DatabaseConnection, code: &str, parent_id: Option<i64>) -> i64 {
    perm_of_kind(db, code, PermissionKind::Menu, parent_id).await
}

pub async fn perm_of_kind(
    db: &DatabaseConnection,
    code: &str,
    kind: PermissionKind,
    parent_id: Option<i64>,
) -> i64 {
    permission::ActiveModel {
        code: Set(code.to_string()),
        name: Set(code.to_string()),
        kind: Set(kind.into()),
        parent_id: Set(parent_id),
        path: Set(String::new()),
        sort_order: Set(0),
        status: Set(Status::Active.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

pub async fn set_permission_status(db: &DatabaseConnection, id: i64, status: Status) {
    permission::Entity::update_many()
        .col_expr(permission::Column::Status, Expr::value(i32::from(status)))
        .filter(permission::Column::Id.eq(id))
        .exec(db)
        .await
        .unwrap();
}

pub async fn role(db: &DatabaseConnection, code: &str) -> i64 {
    role_entity::ActiveModel {
        code: Set(code.to_string()),
        name: Set(code.to_string()),
        kind: Set(RoleKind::Business.into()),
        status: Set(Status::Active.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

pub async fn set_role_status(db: &DatabaseConnection, id: i64, status: Status) {
    role_entity::Entity::update_many()
        .col_expr(role_entity::Column::Status, Expr::value(i32::from(status)))
        .filter(role_entity::Column::Id.eq(id))
        .exec(db)
        .await
        .unwrap();
}

/// User with a placeholder hash; tests that need a real hash go through UserService
pub async fn user(db: &DatabaseConnection, username: &str) -> i64 {
    user_entity::ActiveModel {
        username: Set(username.to_string()),
        password: Set("!".to_string()),
        department_id: Set(None),
        status: Set(Status::Active.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

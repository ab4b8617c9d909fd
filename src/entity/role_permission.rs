//! RolePermission entity - 角色权限关系表
//!
//! 表名: sys_role_permission

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sys_role_permission")]
pub struct Model {
    /// 角色ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub role_id: i64,

    /// 权限ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub permission_id: i64,

    /// 创建人ID
    pub created_by: i64,

    /// 创建时间 (Unix 时间戳)
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
